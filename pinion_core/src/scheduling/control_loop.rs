//! The cooperative single-threaded control loop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::communication::{decode_inbound, encode_value, InboundMessage, MessageGateway, ValueEncoding};
use crate::core::{PointCategory, PointRegistry, Publication, TopicAction};
use crate::error::PinionResult;
use crate::hardware::PinDriver;
use crate::host::HostMonitor;
use crate::io::IoRouter;
use crate::plugins::{PluginRuntime, TickReport};

/// Loop timing and publication settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    /// Sleep at the end of every iteration.
    pub sleep: Duration,
    /// Upper bound on broker servicing per iteration.
    pub pump_timeout: Duration,
    /// Value of `{topicHostName}`.
    pub topic_host_name: String,
    /// Encoding of Output state publications.
    pub output_encoding: ValueEncoding,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            sleep: Duration::from_millis(200),
            pump_timeout: Duration::from_millis(10),
            topic_host_name: "localhost".to_string(),
            output_encoding: ValueEncoding::Numeric,
        }
    }
}

/// Counters for one loop iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: u64,
    pub inbound: usize,
    pub published: usize,
    pub plugins: TickReport,
}

/// Owns every subsystem and runs them in a fixed order each iteration:
///
/// 1. pump the gateway and apply inbound commands
/// 2. host monitors
/// 3. inputs
/// 4. virtuals
/// 5. plugins (snapshot, chain, write-back)
/// 6. outputs
/// 7. flush every shift-register bank once
pub struct ControlLoop<D: PinDriver, G: MessageGateway> {
    registry: PointRegistry,
    router: IoRouter<D>,
    plugins: PluginRuntime,
    monitors: Vec<HostMonitor>,
    gateway: G,
    settings: LoopSettings,
    /// Command topic -> output key.
    command_topics: HashMap<String, String>,
    running: Arc<Mutex<bool>>,
    ticks: u64,
}

impl<D: PinDriver, G: MessageGateway> ControlLoop<D, G> {
    pub fn new(
        registry: PointRegistry,
        router: IoRouter<D>,
        plugins: PluginRuntime,
        gateway: G,
        settings: LoopSettings,
    ) -> Self {
        Self {
            registry,
            router,
            plugins,
            monitors: Vec::new(),
            gateway,
            settings,
            command_topics: HashMap::new(),
            running: Arc::new(Mutex::new(true)),
            ticks: 0,
        }
    }

    pub fn with_monitors(mut self, monitors: Vec<HostMonitor>) -> Self {
        self.monitors = monitors;
        self
    }

    pub fn registry(&self) -> &PointRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PointRegistry {
        &mut self.registry
    }

    pub fn router(&self) -> &IoRouter<D> {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut IoRouter<D> {
        &mut self.router
    }

    pub fn plugins(&self) -> &PluginRuntime {
        &self.plugins
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Shared flag; clearing it ends [`ControlLoop::run`] after the current iteration.
    pub fn stop_handle(&self) -> Arc<Mutex<bool>> {
        self.running.clone()
    }

    pub fn is_running(&self) -> bool {
        if let Ok(running) = self.running.lock() {
            *running
        } else {
            false
        }
    }

    pub fn stop(&self) {
        if let Ok(mut running) = self.running.lock() {
            *running = false;
        }
    }

    /// Subscribe to the command topic of every output that has a topic template.
    pub fn subscribe_commands(&mut self) -> PinionResult<usize> {
        let host = self.settings.topic_host_name.clone();
        for output in self.registry.outputs() {
            if output.direct_pin().is_some_and(|pin| self.router.is_dedicated(pin)) {
                continue;
            }
            if let Some(topic) = output.point.build_topic(&host, TopicAction::Set) {
                self.gateway.subscribe(&topic)?;
                debug!("Output '{}' listens on '{}'", output.point.key, topic);
                self.command_topics.insert(topic, output.point.key.clone());
            }
        }
        info!("Subscribed to {} command topic(s)", self.command_topics.len());
        Ok(self.command_topics.len())
    }

    /// Run one iteration of the loop.
    pub fn tick(&mut self) -> PinionResult<TickSummary> {
        self.ticks += 1;
        let mut summary = TickSummary {
            tick: self.ticks,
            ..Default::default()
        };
        let host = self.settings.topic_host_name.clone();

        match self.gateway.pump(self.settings.pump_timeout) {
            Ok(messages) => {
                summary.inbound = messages.len();
                for message in messages {
                    summary.published += self.handle_command(&message);
                }
            }
            Err(e) => warn!("Messaging pump failed: {}", e),
        }

        for index in 0..self.monitors.len() {
            let reading = self.monitors[index].tick(&host, self.router.one_wire());
            if let Some(reading) = reading {
                if let Some(topic) = reading.topic {
                    summary.published += self.publish_raw(&topic, &reading.payload);
                }
            }
        }

        let inputs = self.registry.tick_inputs(&mut self.router, &host);
        summary.published += self.publish_all(&inputs);

        let virtuals = self.registry.tick_virtuals(&host);
        summary.published += self.publish_all(&virtuals);

        summary.plugins = self.plugins.tick(&mut self.registry);

        let outputs = self.registry.tick_outputs(&mut self.router, &host);
        summary.published += self.publish_all(&outputs);

        if let Err(e) = self.router.flush_all_banks() {
            error!("Bank flush failed: {}", e);
        }

        Ok(summary)
    }

    /// Loop until stopped, sleeping between iterations, then shut down.
    pub fn run(&mut self) -> PinionResult<()> {
        self.run_with_limit(None)
    }

    /// Run at most `ticks` iterations, then shut down.
    pub fn run_for_ticks(&mut self, ticks: u64) -> PinionResult<()> {
        self.run_with_limit(Some(ticks))
    }

    fn run_with_limit(&mut self, limit: Option<u64>) -> PinionResult<()> {
        self.subscribe_commands()?;
        info!(
            "Control loop started: {} input(s), {} output(s), {} virtual(s), {} module(s)",
            self.registry.len(PointCategory::Input),
            self.registry.len(PointCategory::Output),
            self.registry.len(PointCategory::Virtual),
            self.plugins.len()
        );

        let mut iterations = 0;
        while self.is_running() {
            if limit.is_some_and(|max| iterations >= max) {
                info!("Control loop reached its limit of {} tick(s)", iterations);
                break;
            }
            if let Err(e) = self.tick() {
                error!("Tick {} failed: {}", self.ticks, e);
            }
            iterations += 1;
            if !self.settings.sleep.is_zero() {
                thread::sleep(self.settings.sleep);
            }
        }

        self.shutdown()
    }

    /// Disable bank outputs, release the driver and close the gateway.
    pub fn shutdown(&mut self) -> PinionResult<()> {
        self.stop();
        info!("Shutting down control loop after {} tick(s)", self.ticks);
        let released = self.router.shutdown();
        let closed = self.gateway.close();
        released?;
        closed
    }

    /// Apply a command to its output and echo the new state. Returns publications made.
    fn handle_command(&mut self, message: &InboundMessage) -> usize {
        let Some(key) = self.command_topics.get(&message.topic).cloned() else {
            debug!("Ignoring message on unmapped topic '{}'", message.topic);
            return 0;
        };

        let value = decode_inbound(&message.payload);
        if let Err(e) = self.registry.set_value(PointCategory::Output, &key, value) {
            warn!("Command for '{}' dropped: {}", key, e);
            return 0;
        }
        debug!("Output '{}' set to {} from '{}'", key, value, message.topic);

        let state_topic = self
            .registry
            .output(&key)
            .ok()
            .and_then(|o| o.point.build_topic(&self.settings.topic_host_name, TopicAction::State));
        match state_topic {
            Some(topic) => {
                let payload = encode_value(value, self.settings.output_encoding);
                self.publish_raw(&topic, &payload)
            }
            None => 0,
        }
    }

    fn publish_all(&mut self, publications: &[Publication]) -> usize {
        publications
            .iter()
            .map(|p| {
                let encoding = match p.category {
                    PointCategory::Output => self.settings.output_encoding,
                    _ => ValueEncoding::Numeric,
                };
                let payload = encode_value(p.value, encoding);
                self.publish_raw(&p.topic, &payload)
            })
            .sum()
    }

    fn publish_raw(&mut self, topic: &str, payload: &str) -> usize {
        match self.gateway.publish(topic, payload) {
            Ok(()) => 1,
            Err(e) => {
                warn!("Publish to '{}' failed: {}", topic, e);
                0
            }
        }
    }
}
