//! # State Model
//!
//! This module provides the value types the planner searches over:
//!
//! - [`AgentState`]: the planning subject (body slots, resource pools,
//!   inventory and free-form flags)
//! - [`WorldState`]: the environment (named [`Place`]s and [`Item`]s)
//! - [`PlanningState`]: the combined `(agent, world)` pair used as a search node
//!
//! All state types have value semantics: cloning produces a deep, independent
//! copy, so speculative application during search never touches the live state.
//! Every key is stored lower-cased and every accessor lower-cases its argument,
//! which makes reads and writes case-insensitive.
//!
//! ## Basic Usage
//!
//! ```
//! use npc_goap::{AgentState, Place, WorldState};
//!
//! let agent = AgentState::new()
//!     .with_upper_slot("hold", "none")
//!     .with_lower_slot("location", "Picture")
//!     .with_lower_slot("pose", "stand")
//!     .with_resource("time", 0.0)
//!     .with_resource("health", 100.0);
//!
//! assert_eq!(agent.location(), Some("picture"));
//! assert!(agent.hands_free());
//! assert_eq!(agent.resource("HEALTH"), Some(100.0));
//!
//! let mut world = WorldState::new();
//! world.add_place(Place::new("meja").with_item("snack"));
//! assert_eq!(world.place_of("snack"), Some("meja"));
//!
//! // Copies are independent
//! let mut copy = world.clone();
//! copy.place_mut("meja").unwrap().remove_item("snack");
//! assert!(world.place("meja").unwrap().contains("snack"));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use crate::value::Value;

/// Slot value meaning "nothing held".
pub const EMPTY_HAND: &str = "none";

/// The cumulative elapsed-cost resource.
pub const TIME: &str = "time";

/// Normalizes a state key or identifier.
pub(crate) fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

/// The planning subject: an NPC's body, resources, carried items and flags.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    upper_body: BTreeMap<String, Value>,
    lower_body: BTreeMap<String, Value>,
    resources: BTreeMap<String, f64>,
    inventory: BTreeSet<String>,
    flags: BTreeMap<String, Value>,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upper_slot(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.upper_body.insert(normalize(key), normalize_value(value.into()));
        self
    }

    pub fn with_lower_slot(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.lower_body.insert(normalize(key), normalize_value(value.into()));
        self
    }

    pub fn with_resource(mut self, key: &str, amount: f64) -> Self {
        self.resources.insert(normalize(key), amount);
        self
    }

    pub fn with_item(mut self, item: &str) -> Self {
        self.inventory.insert(normalize(item));
        self
    }

    pub fn with_flag(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.flags.insert(normalize(key), value.into());
        self
    }

    pub fn upper_slot(&self, key: &str) -> Option<&Value> {
        self.upper_body.get(&normalize(key))
    }

    pub fn lower_slot(&self, key: &str) -> Option<&Value> {
        self.lower_body.get(&normalize(key))
    }

    /// Looks a slot up in the upper body first, then the lower body.
    pub fn slot(&self, key: &str) -> Option<&Value> {
        let key = normalize(key);
        self.upper_body
            .get(&key)
            .or_else(|| self.lower_body.get(&key))
    }

    /// Text form of a slot, or `""` when absent.
    pub fn slot_text(&self, key: &str) -> String {
        self.slot(key).map(ToString::to_string).unwrap_or_default()
    }

    pub fn has_upper_slot(&self, key: &str) -> bool {
        self.upper_body.contains_key(&normalize(key))
    }

    pub fn has_lower_slot(&self, key: &str) -> bool {
        self.lower_body.contains_key(&normalize(key))
    }

    /// Overwrites an existing slot. Returns `false` when no such slot exists.
    pub fn set_slot(&mut self, key: &str, value: impl Into<Value>) -> bool {
        let key = normalize(key);
        let value = normalize_value(value.into());
        if let Some(slot) = self.upper_body.get_mut(&key) {
            *slot = value;
            true
        } else if let Some(slot) = self.lower_body.get_mut(&key) {
            *slot = value;
            true
        } else {
            false
        }
    }

    /// Case-insensitive comparison of a slot against `expected`; absent slots never match.
    pub fn slot_matches(&self, key: &str, expected: &str) -> bool {
        self.slot(key).map_or(false, |v| v.matches_text(expected))
    }

    pub fn upper_body(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.upper_body.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn lower_body(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.lower_body.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The agent's current place, if the `location` slot holds text.
    pub fn location(&self) -> Option<&str> {
        self.lower_slot("location").and_then(Value::as_text)
    }

    pub fn pose(&self) -> Option<&str> {
        self.lower_slot("pose").and_then(Value::as_text)
    }

    pub fn holding(&self) -> Option<&str> {
        self.upper_slot("hold").and_then(Value::as_text)
    }

    /// True when the `hold` slot exists and holds nothing.
    pub fn hands_free(&self) -> bool {
        self.holding().map_or(false, |h| h == EMPTY_HAND)
    }

    pub fn resource(&self, key: &str) -> Option<f64> {
        self.resources.get(&normalize(key)).copied()
    }

    pub fn has_resource(&self, key: &str) -> bool {
        self.resources.contains_key(&normalize(key))
    }

    pub fn set_resource(&mut self, key: &str, amount: f64) {
        self.resources.insert(normalize(key), amount);
    }

    /// Adds `delta` to an existing resource. Returns `false` when the resource is unknown.
    pub fn adjust_resource(&mut self, key: &str, delta: f64) -> bool {
        match self.resources.get_mut(&normalize(key)) {
            Some(amount) => {
                *amount += delta;
                true
            }
            None => false,
        }
    }

    pub fn resources(&self) -> impl Iterator<Item = (&str, f64)> {
        self.resources.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub(crate) fn clear_resources(&mut self) {
        self.resources.clear();
    }

    pub fn inventory(&self) -> &BTreeSet<String> {
        &self.inventory
    }

    pub fn carries(&self, item: &str) -> bool {
        self.inventory.contains(&normalize(item))
    }

    pub fn add_item(&mut self, item: &str) -> bool {
        self.inventory.insert(normalize(item))
    }

    pub fn remove_item(&mut self, item: &str) -> bool {
        self.inventory.remove(&normalize(item))
    }

    pub fn flag(&self, key: &str) -> Option<&Value> {
        self.flags.get(&normalize(key))
    }

    pub fn flag_is_true(&self, key: &str) -> bool {
        self.flag(key).map_or(false, Value::as_bool)
    }

    pub fn set_flag(&mut self, key: &str, value: impl Into<Value>) {
        self.flags.insert(normalize(key), value.into());
    }

    pub fn flags(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Text slot values are identifiers (places, items, poses) and are stored lower-cased.
fn normalize_value(value: Value) -> Value {
    match value {
        Value::Text(s) => Value::Text(normalize(&s)),
        other => other,
    }
}

impl PartialEq for AgentState {
    fn eq(&self, other: &Self) -> bool {
        self.upper_body == other.upper_body
            && self.lower_body == other.lower_body
            && self.inventory == other.inventory
            && self.flags == other.flags
            && self.resources.len() == other.resources.len()
            && self
                .resources
                .iter()
                .zip(other.resources.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va.to_bits() == vb.to_bits())
    }
}

impl Eq for AgentState {}

impl Hash for AgentState {
    // BTreeMap iteration is sorted, so the hash does not depend on insertion order.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.upper_body.hash(state);
        self.lower_body.hash(state);
        self.inventory.hash(state);
        self.flags.hash(state);
        for (key, amount) in &self.resources {
            key.hash(state);
            amount.to_bits().hash(state);
        }
    }
}

/// A named location holding items and flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Place {
    name: String,
    inventory: BTreeSet<String>,
    flags: BTreeMap<String, Value>,
}

impl Place {
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize(name),
            ..Self::default()
        }
    }

    pub fn with_item(mut self, item: &str) -> Self {
        self.inventory.insert(normalize(item));
        self
    }

    pub fn with_flag(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.flags.insert(normalize(key), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inventory(&self) -> &BTreeSet<String> {
        &self.inventory
    }

    pub fn contains(&self, item: &str) -> bool {
        self.inventory.contains(&normalize(item))
    }

    pub fn add_item(&mut self, item: &str) -> bool {
        self.inventory.insert(normalize(item))
    }

    pub fn remove_item(&mut self, item: &str) -> bool {
        self.inventory.remove(&normalize(item))
    }

    pub fn flag(&self, key: &str) -> Option<&Value> {
        self.flags.get(&normalize(key))
    }

    pub fn set_flag(&mut self, key: &str, value: impl Into<Value>) {
        self.flags.insert(normalize(key), value.into());
    }

    pub fn flags(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A named object with optional behaviors (e.g. "use") and flags.
///
/// Each behavior is a raw effect set keyed by effect address; it is resolved
/// into typed effects when the catalog builds the corresponding action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Item {
    name: String,
    behaviors: BTreeMap<String, BTreeMap<String, Value>>,
    flags: BTreeMap<String, Value>,
}

impl Item {
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize(name),
            ..Self::default()
        }
    }

    pub fn with_behavior(mut self, behavior: &str, effects: BTreeMap<String, Value>) -> Self {
        let effects = effects
            .into_iter()
            .map(|(k, v)| (normalize(&k), v))
            .collect();
        self.behaviors.insert(normalize(behavior), effects);
        self
    }

    pub fn with_flag(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.flags.insert(normalize(key), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn behavior(&self, behavior: &str) -> Option<&BTreeMap<String, Value>> {
        self.behaviors.get(&normalize(behavior))
    }

    /// The effect set of the "use" behavior, when it exists and is non-empty.
    pub fn use_effects(&self) -> Option<&BTreeMap<String, Value>> {
        self.behavior("use").filter(|effects| !effects.is_empty())
    }

    pub fn flag(&self, key: &str) -> Option<&Value> {
        self.flags.get(&normalize(key))
    }

    pub fn set_flag(&mut self, key: &str, value: impl Into<Value>) {
        self.flags.insert(normalize(key), value.into());
    }

    pub fn flags(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// The environment: places and items, keyed by lower-cased name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WorldState {
    places: BTreeMap<String, Place>,
    items: BTreeMap<String, Item>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_place(&mut self, place: Place) {
        self.places.insert(place.name.clone(), place);
    }

    pub fn add_item(&mut self, item: Item) {
        self.items.insert(item.name.clone(), item);
    }

    pub fn place(&self, name: &str) -> Option<&Place> {
        self.places.get(&normalize(name))
    }

    pub fn place_mut(&mut self, name: &str) -> Option<&mut Place> {
        self.places.get_mut(&normalize(name))
    }

    pub fn has_place(&self, name: &str) -> bool {
        self.places.contains_key(&normalize(name))
    }

    pub fn places(&self) -> impl Iterator<Item = &Place> {
        self.places.values()
    }

    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.get(&normalize(name))
    }

    pub fn item_mut(&mut self, name: &str) -> Option<&mut Item> {
        self.items.get_mut(&normalize(name))
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Name of the place whose inventory holds `item`.
    pub fn place_of(&self, item: &str) -> Option<&str> {
        self.places
            .values()
            .find(|p| p.contains(item))
            .map(|p| p.name.as_str())
    }

    /// Checks that every item id sits in at most one container, counting the
    /// agent's inventory as a container.
    pub fn holds_containment_invariant(&self, agent: &AgentState) -> bool {
        let mut seen: BTreeSet<&str> = agent.inventory().iter().map(String::as_str).collect();
        for place in self.places.values() {
            for item in &place.inventory {
                if !seen.insert(item.as_str()) {
                    return false;
                }
            }
        }
        true
    }
}

/// A search node value: the agent and the world it acts in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanningState {
    pub agent: AgentState,
    pub world: WorldState,
}

impl PlanningState {
    pub fn new(agent: AgentState, world: WorldState) -> Self {
        Self { agent, world }
    }

    /// Key used for visited-set deduplication.
    ///
    /// Without resources, two states reached by different paths compare equal
    /// whenever slots, inventory, flags and world agree. The search then keeps
    /// every such state not beaten on both path cost and remaining resources.
    pub fn signature(&self, include_resources: bool) -> PlanningState {
        let mut key = self.clone();
        if !include_resources {
            key.agent.clear_resources();
        }
        key
    }
}
