//! Serializable read-only views of the live state, for UI and debugging.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::state::{AgentState, WorldState, EMPTY_HAND};
use crate::value::Value;
use crate::Result;

const UNKNOWN: &str = "unknown";

/// The agent at a glance, every field rendered as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub location: String,
    /// Comma-separated carried items, or "none"
    pub inventory: String,
    pub pose: String,
    pub holding: String,
    pub resources: BTreeMap<String, String>,
}

impl StatusSnapshot {
    pub fn from_state(agent: &AgentState) -> Self {
        let inventory = if agent.inventory().is_empty() {
            EMPTY_HAND.to_string()
        } else {
            agent.inventory().iter().cloned().collect::<Vec<_>>().join(", ")
        };
        Self {
            location: agent.location().unwrap_or(UNKNOWN).to_string(),
            inventory,
            pose: agent.pose().unwrap_or(UNKNOWN).to_string(),
            holding: agent.holding().unwrap_or(EMPTY_HAND).to_string(),
            resources: agent
                .resources()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// A resource as text, "0" when the agent has no such pool.
    pub fn resource(&self, key: &str) -> &str {
        self.resources.get(key).map_or("0", String::as_str)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSnapshot {
    pub name: String,
    pub inventory: Vec<String>,
    pub flags: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub name: String,
}

/// Every place with its contents and flags, and every known item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub places: BTreeMap<String, PlaceSnapshot>,
    pub items: BTreeMap<String, ItemSnapshot>,
}

impl WorldSnapshot {
    pub fn from_state(world: &WorldState) -> Self {
        let places = world
            .places()
            .map(|place| {
                let snapshot = PlaceSnapshot {
                    name: place.name().to_string(),
                    inventory: place.inventory().iter().cloned().collect(),
                    flags: place
                        .flags()
                        .map(|(k, v)| (k.to_string(), v.clone()))
                        .collect(),
                };
                (place.name().to_string(), snapshot)
            })
            .collect();
        let items = world
            .items()
            .map(|item| {
                let name = item.name().to_string();
                (name.clone(), ItemSnapshot { name })
            })
            .collect();
        Self { places, items }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
