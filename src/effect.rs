//! Typed effect addressing.
//!
//! Effects are written as string keys (`"hold"`, `"pickup_item"`,
//! `"place_state:tv:tv_state"`, ...) in configuration, but are resolved once,
//! when an action is constructed, into an [`EffectTarget`]. Resolution follows
//! a fixed order against the agent's slot and resource schema:
//!
//! 1. an existing upper- or lower-body slot
//! 2. an existing resource
//! 3. the `pickup_item` / `drop_item` sentinels
//! 4. `place_state:<place>:<flag>` and `item_state:<item>:<flag>` addresses
//! 5. anything else is a free-form agent flag

use std::fmt;

use log::warn;

use crate::state::{normalize, AgentState, WorldState};
use crate::value::Value;

/// Tolerance for comparing resource values in goal checks.
pub const RESOURCE_EPSILON: f64 = 1e-3;

pub const PICKUP_ITEM: &str = "pickup_item";
pub const DROP_ITEM: &str = "drop_item";
pub const USE_ITEM: &str = "use_item";
const PLACE_STATE_PREFIX: &str = "place_state:";
const ITEM_STATE_PREFIX: &str = "item_state:";

/// Where an effect writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EffectTarget {
    /// An upper- or lower-body slot
    AgentSlot(String),
    Resource(String),
    /// Move the named item from the agent's current place into its inventory
    Pickup,
    /// Move the named item from the agent's inventory to its current place
    Drop,
    PlaceFlag { place: String, key: String },
    ItemFlag { item: String, key: String },
    /// A free-form agent flag
    Flag(String),
}

impl EffectTarget {
    /// Resolves a string effect key against the agent's schema.
    pub fn classify(key: &str, schema: &AgentState) -> Self {
        let key = normalize(key);
        if schema.has_upper_slot(&key) || schema.has_lower_slot(&key) {
            return EffectTarget::AgentSlot(key);
        }
        if schema.has_resource(&key) {
            return EffectTarget::Resource(key);
        }
        if key == PICKUP_ITEM {
            return EffectTarget::Pickup;
        }
        if key == DROP_ITEM {
            return EffectTarget::Drop;
        }
        if let Some(rest) = key.strip_prefix(PLACE_STATE_PREFIX) {
            if let Some((place, flag)) = split_address(rest) {
                return EffectTarget::PlaceFlag {
                    place,
                    key: flag,
                };
            }
            warn!("Malformed place_state key '{}', treating it as an agent flag", key);
        }
        if let Some(rest) = key.strip_prefix(ITEM_STATE_PREFIX) {
            if let Some((item, flag)) = split_address(rest) {
                return EffectTarget::ItemFlag { item, key: flag };
            }
            warn!("Malformed item_state key '{}', treating it as an agent flag", key);
        }
        EffectTarget::Flag(key)
    }
}

fn split_address(rest: &str) -> Option<(String, String)> {
    let mut parts = rest.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(flag), None) if !owner.is_empty() && !flag.is_empty() => {
            Some((owner.to_string(), flag.to_string()))
        }
        _ => None,
    }
}

impl fmt::Display for EffectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectTarget::AgentSlot(key) | EffectTarget::Resource(key) | EffectTarget::Flag(key) => {
                write!(f, "{}", key)
            }
            EffectTarget::Pickup => write!(f, "{}", PICKUP_ITEM),
            EffectTarget::Drop => write!(f, "{}", DROP_ITEM),
            EffectTarget::PlaceFlag { place, key } => write!(f, "{}{}:{}", PLACE_STATE_PREFIX, place, key),
            EffectTarget::ItemFlag { item, key } => write!(f, "{}{}:{}", ITEM_STATE_PREFIX, item, key),
        }
    }
}

/// A single state change: a target and the value written to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Effect {
    pub target: EffectTarget,
    pub value: Value,
}

impl Effect {
    pub fn new(target: EffectTarget, value: impl Into<Value>) -> Self {
        Self {
            target,
            value: value.into(),
        }
    }

    /// Builds an effect from a string key, resolving it against `schema`.
    pub fn classify(key: &str, value: impl Into<Value>, schema: &AgentState) -> Self {
        Self::new(EffectTarget::classify(key, schema), value)
    }

    /// Item id carried by a pickup/drop effect.
    fn item_id(&self) -> String {
        normalize(&self.value.to_string())
    }

    /// Writes this effect into the given state.
    ///
    /// Inconsistent addressing (an unknown place, a missing item) is reported
    /// with a warning and skipped; it never aborts the caller.
    pub fn apply(&self, agent: &mut AgentState, world: &mut WorldState) {
        match &self.target {
            EffectTarget::AgentSlot(key) => {
                if !agent.set_slot(key, self.value.clone()) {
                    agent.set_flag(key, self.value.clone());
                }
            }
            EffectTarget::Resource(key) => match self.value.as_number() {
                Some(amount) if agent.has_resource(key) => agent.set_resource(key, amount),
                Some(_) => agent.set_flag(key, self.value.clone()),
                None => warn!("Resource effect '{}' has non-numeric value '{}'", key, self.value),
            },
            EffectTarget::Pickup => {
                let item = self.item_id();
                let location = agent.location().unwrap_or_default().to_string();
                if world
                    .place_mut(&location)
                    .map_or(false, |place| place.remove_item(&item))
                {
                    agent.add_item(&item);
                } else {
                    warn!("Cannot pick up '{}': not present at '{}'", item, location);
                }
            }
            EffectTarget::Drop => {
                let item = self.item_id();
                let location = agent.location().unwrap_or_default().to_string();
                if !agent.carries(&item) {
                    warn!("Cannot drop '{}': not carried", item);
                    return;
                }
                match world.place_mut(&location) {
                    Some(place) => {
                        agent.remove_item(&item);
                        place.add_item(&item);
                    }
                    None => warn!("Cannot drop '{}': unknown place '{}'", item, location),
                }
            }
            EffectTarget::PlaceFlag { place, key } => match world.place_mut(place) {
                Some(p) => p.set_flag(key, self.value.clone()),
                None => warn!("Place '{}' not found for effect '{}'", place, self.target),
            },
            EffectTarget::ItemFlag { item, key } => match world.item_mut(item) {
                Some(i) => i.set_flag(key, self.value.clone()),
                None => warn!("Item '{}' not found for effect '{}'", item, self.target),
            },
            EffectTarget::Flag(key) => agent.set_flag(key, self.value.clone()),
        }
    }

    /// Whether the state already reflects this effect.
    ///
    /// Slots and flags compare as case-insensitive text, resources within
    /// [`RESOURCE_EPSILON`], and pickup/drop by inventory membership.
    pub fn is_reflected_in(&self, agent: &AgentState, world: &WorldState) -> bool {
        match &self.target {
            EffectTarget::AgentSlot(key) => agent
                .slot(key)
                .or_else(|| agent.flag(key))
                .map_or(false, |v| v.loosely_equals(&self.value, RESOURCE_EPSILON)),
            EffectTarget::Resource(key) => match (agent.resource(key), self.value.as_number()) {
                (Some(current), Some(expected)) => (current - expected).abs() < RESOURCE_EPSILON,
                _ => false,
            },
            EffectTarget::Pickup => agent.carries(&self.item_id()),
            EffectTarget::Drop => agent
                .location()
                .and_then(|loc| world.place(loc))
                .map_or(false, |p| p.contains(&self.item_id())),
            EffectTarget::PlaceFlag { place, key } => world
                .place(place)
                .and_then(|p| p.flag(key))
                .map_or(false, |v| v.loosely_equals(&self.value, RESOURCE_EPSILON)),
            EffectTarget::ItemFlag { item, key } => world
                .item(item)
                .and_then(|i| i.flag(key))
                .map_or(false, |v| v.loosely_equals(&self.value, RESOURCE_EPSILON)),
            EffectTarget::Flag(key) if key == USE_ITEM => {
                agent.flag_is_true(&format!("used_{}", self.item_id()))
            }
            EffectTarget::Flag(key) => agent
                .flag(key)
                .map_or(false, |v| v.loosely_equals(&self.value, RESOURCE_EPSILON)),
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.target, self.value)
    }
}
