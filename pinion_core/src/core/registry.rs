//! Keyed storage for every Input, Output and Virtual point.

use std::collections::HashMap;
use tracing::{debug, warn};

use super::point::{is_truthy, HasPoint, Input, Output, Point, PointCategory, TopicAction, Virtual};
use crate::error::{PinionError, PinionResult};
use crate::hardware::PinDriver;
use crate::io::IoRouter;

/// A value that became due this iteration together with its rendered state topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub category: PointCategory,
    pub key: String,
    pub topic: String,
    pub value: f64,
}

/// Registration-ordered table with a key index.
#[derive(Debug, Clone)]
struct PointTable<T> {
    entries: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T: HasPoint> PointTable<T> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, entry: T) -> PinionResult<()> {
        let key = entry.point().key.clone();
        if self.index.contains_key(&key) {
            return Err(PinionError::duplicate(T::CATEGORY, key));
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    fn get(&self, key: &str) -> PinionResult<&T> {
        self.index
            .get(key)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| PinionError::not_found(T::CATEGORY, key))
    }

    fn get_mut(&mut self, key: &str) -> PinionResult<&mut T> {
        match self.index.get(key) {
            Some(&i) => Ok(&mut self.entries[i]),
            None => Err(PinionError::not_found(T::CATEGORY, key)),
        }
    }
}

/// Any point, for category-agnostic registration.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyPoint {
    Input(Input),
    Output(Output),
    Virtual(Virtual),
}

impl From<Input> for AnyPoint {
    fn from(input: Input) -> Self {
        AnyPoint::Input(input)
    }
}

impl From<Output> for AnyPoint {
    fn from(output: Output) -> Self {
        AnyPoint::Output(output)
    }
}

impl From<Virtual> for AnyPoint {
    fn from(virtual_point: Virtual) -> Self {
        AnyPoint::Virtual(virtual_point)
    }
}

/// Registry of all points, one namespace per category.
///
/// Keys are unique within a category. Iteration follows registration order.
#[derive(Debug, Clone)]
pub struct PointRegistry {
    inputs: PointTable<Input>,
    outputs: PointTable<Output>,
    virtuals: PointTable<Virtual>,
}

impl Default for PointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PointRegistry {
    pub fn new() -> Self {
        Self {
            inputs: PointTable::new(),
            outputs: PointTable::new(),
            virtuals: PointTable::new(),
        }
    }

    /// Register a point under its category. Fails if the key is already taken there.
    pub fn register(&mut self, point: impl Into<AnyPoint>) -> PinionResult<()> {
        match point.into() {
            AnyPoint::Input(input) => self.inputs.insert(input),
            AnyPoint::Output(output) => self.outputs.insert(output),
            AnyPoint::Virtual(virtual_point) => self.virtuals.insert(virtual_point),
        }
    }

    /// Look up the common attributes of a point.
    pub fn get(&self, category: PointCategory, key: &str) -> PinionResult<&Point> {
        match category {
            PointCategory::Input => self.inputs.get(key).map(HasPoint::point),
            PointCategory::Output => self.outputs.get(key).map(HasPoint::point),
            PointCategory::Virtual => self.virtuals.get(key).map(HasPoint::point),
        }
    }

    pub fn get_mut(&mut self, category: PointCategory, key: &str) -> PinionResult<&mut Point> {
        match category {
            PointCategory::Input => self.inputs.get_mut(key).map(HasPoint::point_mut),
            PointCategory::Output => self.outputs.get_mut(key).map(HasPoint::point_mut),
            PointCategory::Virtual => self.virtuals.get_mut(key).map(HasPoint::point_mut),
        }
    }

    pub fn contains(&self, category: PointCategory, key: &str) -> bool {
        self.get(category, key).is_ok()
    }

    pub fn value(&self, category: PointCategory, key: &str) -> PinionResult<f64> {
        self.get(category, key).map(|point| point.value)
    }

    pub fn set_value(&mut self, category: PointCategory, key: &str, value: f64) -> PinionResult<()> {
        self.get_mut(category, key)?.value = value;
        Ok(())
    }

    /// Flip an output between 0 and 1, returning the new value.
    pub fn toggle_output(&mut self, key: &str) -> PinionResult<f64> {
        let point = self.get_mut(PointCategory::Output, key)?;
        point.value = if is_truthy(point.value) { 0.0 } else { 1.0 };
        Ok(point.value)
    }

    pub fn input(&self, key: &str) -> PinionResult<&Input> {
        self.inputs.get(key)
    }

    pub fn output(&self, key: &str) -> PinionResult<&Output> {
        self.outputs.get(key)
    }

    pub fn virtual_point(&self, key: &str) -> PinionResult<&Virtual> {
        self.virtuals.get(key)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Input> {
        self.inputs.entries.iter()
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Output> {
        self.outputs.entries.iter()
    }

    pub fn virtuals(&self) -> impl Iterator<Item = &Virtual> {
        self.virtuals.entries.iter()
    }

    pub fn len(&self, category: PointCategory) -> usize {
        match category {
            PointCategory::Input => self.inputs.entries.len(),
            PointCategory::Output => self.outputs.entries.len(),
            PointCategory::Virtual => self.virtuals.entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        PointCategory::ALL.iter().all(|&category| self.len(category) == 0)
    }

    /// Run one iteration for a single point.
    ///
    /// When the point is due an Input re-reads its source and an Output writes its
    /// value to hardware. Returns the state publication when the point is due and has
    /// a topic. Points bound to dedicated control lines are never ticked.
    pub fn tick_point<D: PinDriver>(
        &mut self,
        category: PointCategory,
        key: &str,
        router: &mut IoRouter<D>,
        host: &str,
    ) -> PinionResult<Option<Publication>> {
        match category {
            PointCategory::Input => tick_input(self.inputs.get_mut(key)?, router, host),
            PointCategory::Output => tick_output(self.outputs.get_mut(key)?, router, host),
            PointCategory::Virtual => Ok(tick_virtual(self.virtuals.get_mut(key)?, host)),
        }
    }

    /// Tick every input. A failing read is logged and leaves the previous value in place.
    pub fn tick_inputs<D: PinDriver>(&mut self, router: &mut IoRouter<D>, host: &str) -> Vec<Publication> {
        let mut published = Vec::new();
        for input in self.inputs.entries.iter_mut() {
            match tick_input(input, router, host) {
                Ok(Some(publication)) => published.push(publication),
                Ok(None) => {}
                Err(e) => warn!("Failed to read input '{}': {}", input.point.key, e),
            }
        }
        published
    }

    pub fn tick_virtuals(&mut self, host: &str) -> Vec<Publication> {
        self.virtuals
            .entries
            .iter_mut()
            .filter_map(|virtual_point| tick_virtual(virtual_point, host))
            .collect()
    }

    /// Tick every output. A failing write is logged and the output is retried when next due.
    pub fn tick_outputs<D: PinDriver>(&mut self, router: &mut IoRouter<D>, host: &str) -> Vec<Publication> {
        let mut published = Vec::new();
        for output in self.outputs.entries.iter_mut() {
            match tick_output(output, router, host) {
                Ok(Some(publication)) => published.push(publication),
                Ok(None) => {}
                Err(e) => warn!("Failed to write output '{}': {}", output.point.key, e),
            }
        }
        published
    }
}

fn state_publication(point: &Point, category: PointCategory, host: &str) -> Option<Publication> {
    point
        .build_topic(host, TopicAction::State)
        .map(|topic| Publication {
            category,
            key: point.key.clone(),
            topic,
            value: point.value,
        })
}

fn tick_input<D: PinDriver>(
    input: &mut Input,
    router: &mut IoRouter<D>,
    host: &str,
) -> PinionResult<Option<Publication>> {
    if input.pin().is_some_and(|pin| router.is_dedicated(pin)) {
        return Ok(None);
    }
    if !input.point.interval_expired() {
        return Ok(None);
    }

    input.point.value = router.read_input(&input.source)?;
    Ok(state_publication(&input.point, PointCategory::Input, host))
}

fn tick_output<D: PinDriver>(
    output: &mut Output,
    router: &mut IoRouter<D>,
    host: &str,
) -> PinionResult<Option<Publication>> {
    if output.direct_pin().is_some_and(|pin| router.is_dedicated(pin)) {
        debug!("Skipping control line output '{}'", output.point.key);
        return Ok(None);
    }
    if !output.point.interval_expired() {
        return Ok(None);
    }

    router.write_device(&output.device, output.point.value)?;
    Ok(state_publication(&output.point, PointCategory::Output, host))
}

fn tick_virtual(virtual_point: &mut Virtual, host: &str) -> Option<Publication> {
    if !virtual_point.point.interval_expired() {
        return None;
    }
    state_publication(&virtual_point.point, PointCategory::Virtual, host)
}
