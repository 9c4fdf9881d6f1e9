//! Action preconditions.
//!
//! A precondition is a named boolean test over `(AgentState, WorldState)`.
//! Tests are plain data ([`Condition`]) built by the factory functions below,
//! so actions stay `Clone + Debug` and never capture ambient state.

use serde::{Deserialize, Serialize};

use crate::state::{normalize, AgentState, WorldState};
use crate::value::Value;

/// A boolean test over agent and world state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// A body slot equals `value` (case-insensitive)
    SlotEquals { slot: String, value: String },
    LocationIs { place: String },
    PoseIs { pose: String },
    Holding { item: String },
    HandsFree,
    Carries { item: String },
    /// The item lies in the inventory of the agent's current place
    ItemAtLocation { item: String },
    FlagIs { key: String, value: Value },
    PlaceFlagIs { place: String, key: String, value: Value },
    Not { condition: Box<Condition> },
}

impl Condition {
    pub fn evaluate(&self, agent: &AgentState, world: &WorldState) -> bool {
        match self {
            Condition::SlotEquals { slot, value } => agent.slot_matches(slot, value),
            Condition::LocationIs { place } => agent.slot_matches("location", place),
            Condition::PoseIs { pose } => agent.slot_matches("pose", pose),
            Condition::Holding { item } => agent.slot_matches("hold", item),
            Condition::HandsFree => agent.hands_free(),
            Condition::Carries { item } => agent.carries(item),
            Condition::ItemAtLocation { item } => agent
                .location()
                .and_then(|loc| world.place(loc))
                .map_or(false, |p| p.contains(item)),
            Condition::FlagIs { key, value } => agent
                .flag(key)
                .map_or(false, |v| v.matches_text(&value.to_string())),
            Condition::PlaceFlagIs { place, key, value } => world
                .place(place)
                .and_then(|p| p.flag(key))
                .map_or(false, |v| v.matches_text(&value.to_string())),
            Condition::Not { condition } => !condition.evaluate(agent, world),
        }
    }
}

pub fn slot_equals(slot: &str, value: &str) -> Condition {
    Condition::SlotEquals {
        slot: normalize(slot),
        value: normalize(value),
    }
}

pub fn location_is(place: &str) -> Condition {
    Condition::LocationIs {
        place: normalize(place),
    }
}

pub fn pose_is(pose: &str) -> Condition {
    Condition::PoseIs {
        pose: normalize(pose),
    }
}

pub fn holding(item: &str) -> Condition {
    Condition::Holding {
        item: normalize(item),
    }
}

pub fn hands_free() -> Condition {
    Condition::HandsFree
}

pub fn carries(item: &str) -> Condition {
    Condition::Carries {
        item: normalize(item),
    }
}

pub fn item_at_location(item: &str) -> Condition {
    Condition::ItemAtLocation {
        item: normalize(item),
    }
}

pub fn flag_is(key: &str, value: impl Into<Value>) -> Condition {
    Condition::FlagIs {
        key: normalize(key),
        value: value.into(),
    }
}

pub fn place_flag_is(place: &str, key: &str, value: impl Into<Value>) -> Condition {
    Condition::PlaceFlagIs {
        place: normalize(place),
        key: normalize(key),
        value: value.into(),
    }
}

pub fn not(condition: Condition) -> Condition {
    Condition::Not {
        condition: Box::new(condition),
    }
}

/// A named precondition, as held by an action.
#[derive(Debug, Clone, PartialEq)]
pub struct Precondition {
    pub name: String,
    pub condition: Condition,
}

impl Precondition {
    pub fn new(name: impl Into<String>, condition: Condition) -> Self {
        Self {
            name: name.into(),
            condition,
        }
    }

    pub fn holds(&self, agent: &AgentState, world: &WorldState) -> bool {
        self.condition.evaluate(agent, world)
    }
}
