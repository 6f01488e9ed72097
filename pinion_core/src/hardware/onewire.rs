use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Value reported when a sensor cannot be read.
pub const SENSOR_FAULT: f64 = -1000.0;

/// Default sysfs directory of the w1 bus.
pub const DEFAULT_W1_PATH: &str = "/sys/bus/w1/devices";

/// Reader for DS18B20-style sensors exposed through the kernel w1 driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneWireBus {
    base_dir: PathBuf,
}

impl Default for OneWireBus {
    fn default() -> Self {
        Self::new(DEFAULT_W1_PATH)
    }
}

impl OneWireBus {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Temperature in degrees Celsius, or [`SENSOR_FAULT`] when the read fails.
    pub fn read_temperature(&self, device: &str) -> f64 {
        let path = self.base_dir.join(device).join("w1_slave");
        match fs::read_to_string(&path) {
            Ok(contents) => parse_w1_slave(&contents).unwrap_or_else(|| {
                warn!("Unusable reading from one-wire sensor '{}'", device);
                SENSOR_FAULT
            }),
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                SENSOR_FAULT
            }
        }
    }
}

/// Parse the two-line `w1_slave` format.
///
/// The first line must end in `YES` (CRC ok); the second carries `t=<millidegrees>`.
pub fn parse_w1_slave(contents: &str) -> Option<f64> {
    let mut lines = contents.lines();
    let crc_line = lines.next()?;
    if !crc_line.trim_end().ends_with("YES") {
        return None;
    }

    let data_line = lines.next()?;
    let (_, raw) = data_line.split_once("t=")?;
    let millidegrees: f64 = raw.trim().parse().ok()?;
    Some(millidegrees / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const GOOD: &str = "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n72 01 4b 46 7f ff 0e 10 57 t=23125\n";

    #[test]
    fn test_parse_good_reading() {
        assert_relative_eq!(parse_w1_slave(GOOD).unwrap(), 23.125);
    }

    #[test]
    fn test_parse_negative_reading() {
        let text = "ff ff : crc=ff YES\nff ff t=-1500\n";
        assert_relative_eq!(parse_w1_slave(text).unwrap(), -1.5);
    }

    #[test]
    fn test_crc_failure() {
        let text = "72 01 : crc=57 NO\n72 01 t=23125\n";
        assert_eq!(parse_w1_slave(text), None);
    }

    #[test]
    fn test_missing_temperature() {
        assert_eq!(parse_w1_slave("aa : crc=57 YES\naa bb\n"), None);
        assert_eq!(parse_w1_slave(""), None);
    }

    #[test]
    fn test_read_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let device_dir = dir.path().join("28-0000075a1c2b");
        fs::create_dir_all(&device_dir).unwrap();
        fs::write(device_dir.join("w1_slave"), GOOD).unwrap();

        let bus = OneWireBus::new(dir.path());
        assert_relative_eq!(bus.read_temperature("28-0000075a1c2b"), 23.125);
        assert_eq!(bus.read_temperature("28-missing"), SENSOR_FAULT);
    }
}
