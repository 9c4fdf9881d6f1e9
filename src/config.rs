//! # World Configuration
//!
//! A [`WorldConfig`] describes everything needed to stand up an agent: the
//! places and items of the world, how places connect, the gesture
//! repertoire, the agent's starting body and resources, custom
//! [`ActionTemplate`]s, and planner limits. It is plain serde data and can be
//! loaded from JSON.
//!
//! `WorldConfig::default()` is the living-room scenario: five places
//! (piano, picture, tv, meja, sofa), three items (snack, lance, pillow) and
//! fifteen gestures, with the agent standing at the picture.
//!
//! ```
//! use npc_goap::WorldConfig;
//!
//! let config = WorldConfig::from_json_str(r#"{
//!     "places": [
//!         { "name": "kitchen", "items": ["apple"] },
//!         { "name": "hall" }
//!     ],
//!     "items": [ { "name": "apple", "behaviors": { "use": { "health": 5 } } } ],
//!     "gestures": ["Wave"],
//!     "agent": {
//!         "upper_body": { "hold": "none" },
//!         "lower_body": { "location": "hall", "pose": "stand" },
//!         "resources": { "time": 0, "health": 50 }
//!     }
//! }"#).unwrap();
//!
//! let (agent, world) = config.initial_state();
//! let catalog = config.build_catalog(&agent, &world).unwrap();
//! assert!(catalog.contains("move_hall_to_kitchen"));
//! assert!(catalog.contains("use_apple"));
//! assert!(catalog.is_gesture("wave"));
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::catalog::{ActionCatalog, ActionTemplate};
use crate::condition::{carries, holding, location_is, pose_is};
use crate::planner::PlannerConfig;
use crate::state::{normalize, AgentState, Item, Place, WorldState};
use crate::value::Value;
use crate::Result;

const DEFAULT_MOVE_COST: f64 = 1.5;

fn default_move_cost() -> f64 {
    DEFAULT_MOVE_COST
}

fn default_true() -> bool {
    true
}

/// A place and what it initially holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceConfig {
    pub name: String,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub flags: BTreeMap<String, Value>,
}

impl PlaceConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: Vec::new(),
            flags: BTreeMap::new(),
        }
    }

    pub fn with_item(mut self, item: &str) -> Self {
        self.items.push(item.to_string());
        self
    }

    pub fn with_flag(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.flags.insert(key.to_string(), value.into());
        self
    }
}

/// An item with its behaviors (`"use"` -> effect set) and flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemConfig {
    pub name: String,
    #[serde(default)]
    pub behaviors: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(default)]
    pub flags: BTreeMap<String, Value>,
}

impl ItemConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            behaviors: BTreeMap::new(),
            flags: BTreeMap::new(),
        }
    }

    pub fn with_use(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.behaviors
            .entry("use".to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }
}

/// An undirected connection between two places with its travel cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub between: [String; 2],
    pub cost: f64,
}

impl EdgeConfig {
    pub fn new(a: &str, b: &str, cost: f64) -> Self {
        Self {
            between: [a.to_string(), b.to_string()],
            cost,
        }
    }

    fn joins(&self, from: &str, to: &str) -> bool {
        let [a, b] = &self.between;
        let (a, b) = (normalize(a), normalize(b));
        (a == from && b == to) || (a == to && b == from)
    }
}

/// The agent's starting body, resources, inventory and flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub upper_body: BTreeMap<String, Value>,
    pub lower_body: BTreeMap<String, Value>,
    pub resources: BTreeMap<String, f64>,
    pub inventory: Vec<String>,
    pub flags: BTreeMap<String, Value>,
}

/// Full description of a world, its agent and its actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    #[serde(default)]
    pub places: Vec<PlaceConfig>,
    #[serde(default)]
    pub items: Vec<ItemConfig>,
    /// Connect every pair of places; otherwise only `edges` connect
    #[serde(default = "default_true")]
    pub fully_connected: bool,
    /// Cost of a move with no matching edge
    #[serde(default = "default_move_cost")]
    pub move_cost: f64,
    /// Per-edge costs; both directions
    #[serde(default)]
    pub edges: Vec<EdgeConfig>,
    #[serde(default)]
    pub gestures: Vec<String>,
    #[serde(default)]
    pub agent: AgentConfig,
    /// Custom actions
    #[serde(default)]
    pub actions: Vec<ActionTemplate>,
    #[serde(default)]
    pub planner: PlannerConfig,
}

impl WorldConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// `GoapError::Io` if the file cannot be read, `GoapError::Serialization`
    /// if it is not a valid configuration.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        debug!("Loading world configuration from {}", path.as_ref().display());
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builds the starting agent and world.
    ///
    /// Items listed in a place or the agent's inventory without an item
    /// declaration are added as plain items.
    pub fn initial_state(&self) -> (AgentState, WorldState) {
        let mut agent = AgentState::new();
        for (key, value) in &self.agent.upper_body {
            agent = agent.with_upper_slot(key, value.clone());
        }
        for (key, value) in &self.agent.lower_body {
            agent = agent.with_lower_slot(key, value.clone());
        }
        for (key, amount) in &self.agent.resources {
            agent = agent.with_resource(key, *amount);
        }
        for item in &self.agent.inventory {
            agent = agent.with_item(item);
        }
        for (key, value) in &self.agent.flags {
            agent = agent.with_flag(key, value.clone());
        }

        let mut world = WorldState::new();
        for config in &self.items {
            let mut item = Item::new(&config.name);
            for (behavior, effects) in &config.behaviors {
                item = item.with_behavior(behavior, effects.clone());
            }
            for (key, value) in &config.flags {
                item = item.with_flag(key, value.clone());
            }
            world.add_item(item);
        }
        for config in &self.places {
            let mut place = Place::new(&config.name);
            for item in &config.items {
                place = place.with_item(item);
            }
            for (key, value) in &config.flags {
                place = place.with_flag(key, value.clone());
            }
            world.add_place(place);
        }

        let listed: Vec<String> = self
            .places
            .iter()
            .flat_map(|p| p.items.iter())
            .chain(self.agent.inventory.iter())
            .cloned()
            .collect();
        for name in listed {
            if world.item(&name).is_none() {
                warn!("Item '{}' is placed but not declared, adding it without behaviors", name);
                world.add_item(Item::new(&name));
            }
        }

        (agent, world)
    }

    /// Travel cost between two places, `None` when they are not connected.
    pub fn move_cost(&self, from: &str, to: &str) -> Option<f64> {
        let (from, to) = (normalize(from), normalize(to));
        if from == to {
            return None;
        }
        match self.edges.iter().find(|e| e.joins(&from, &to)) {
            Some(edge) => Some(edge.cost),
            None if self.fully_connected => Some(self.move_cost),
            None => None,
        }
    }

    /// Builds the action catalog: custom actions first, then moves,
    /// gestures, pick/drop per item, and `use_<item>` for usable items
    /// without a custom use action.
    pub fn build_catalog(&self, agent: &AgentState, world: &WorldState) -> Result<ActionCatalog> {
        let mut catalog = ActionCatalog::new();
        for template in &self.actions {
            catalog.add_template(template, agent)?;
        }
        for from in &self.places {
            for to in &self.places {
                if let Some(cost) = self.move_cost(&from.name, &to.name) {
                    catalog.add_move(&from.name, &to.name, cost, agent)?;
                }
            }
        }
        for gesture in &self.gestures {
            catalog.add_gesture(gesture, agent)?;
        }
        catalog.add_item_actions(world, agent)?;
        catalog.add_use_actions(world, agent)?;
        debug!(
            "Built catalog with {} actions ({} gestures)",
            catalog.len(),
            self.gestures.len()
        );
        Ok(catalog)
    }
}

fn template(
    name: &str,
    conditions: Vec<(&str, crate::condition::Condition)>,
    effects: Vec<(&str, Value)>,
    costs: [(&str, f64); 3],
) -> ActionTemplate {
    ActionTemplate {
        name: name.to_string(),
        conditions: conditions
            .into_iter()
            .map(|(k, c)| (k.to_string(), c))
            .collect(),
        effects: effects.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        costs: costs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        let places = vec![
            PlaceConfig::new("piano"),
            PlaceConfig::new("picture"),
            PlaceConfig::new("tv").with_flag("tv_state", "off"),
            PlaceConfig::new("meja").with_item("lance").with_item("snack"),
            PlaceConfig::new("sofa").with_item("pillow"),
        ];

        let items = vec![
            ItemConfig::new("snack").with_use("health", 100.0),
            ItemConfig::new("lance").with_use("health", 10.0),
            ItemConfig::new("pillow"),
        ];

        let gestures = [
            "Bashful",
            "Happy Gesture",
            "Crying",
            "Thinking",
            "Talking",
            "Looking",
            "No",
            "Fist Pump",
            "Agreeing",
            "Arguing",
            "Thankful",
            "Excited",
            "Clapping",
            "Rejected",
            "Look Around",
        ]
        .iter()
        .map(|g| g.to_string())
        .collect();

        let agent = AgentConfig {
            upper_body: [("hold".to_string(), Value::from("none"))].into_iter().collect(),
            lower_body: [
                ("location".to_string(), Value::from("picture")),
                ("pose".to_string(), Value::from("stand")),
            ]
            .into_iter()
            .collect(),
            resources: [
                ("time".to_string(), 0.0),
                ("health".to_string(), 100.0),
                ("mental".to_string(), 100.0),
            ]
            .into_iter()
            .collect(),
            inventory: Vec::new(),
            flags: BTreeMap::new(),
        };

        let actions = vec![
            template(
                "sit_sofa",
                vec![("location", location_is("sofa")), ("pose", pose_is("stand"))],
                vec![("pose", Value::from("sit"))],
                [("time", 1.0), ("health", 1.0), ("mental", 1.0)],
            ),
            template(
                "stand_sofa",
                vec![("location", location_is("sofa")), ("pose", pose_is("sit"))],
                vec![("pose", Value::from("stand"))],
                [("time", 1.0), ("health", 3.0), ("mental", 3.0)],
            ),
            template(
                "use_lance",
                vec![
                    ("has_lance", carries("lance")),
                    ("is_holding_lance", holding("lance")),
                ],
                vec![("used_lance", Value::from(true))],
                [("time", 1.0), ("health", 0.0), ("mental", 0.0)],
            ),
            template(
                "set_tv_state_on",
                vec![("is_near_tv", location_is("tv"))],
                vec![("place_state:tv:tv_state", Value::from("on"))],
                [("time", 0.5), ("health", 0.0), ("mental", 0.0)],
            ),
            template(
                "set_tv_state_off",
                vec![("is_near_tv", location_is("tv"))],
                vec![("place_state:tv:tv_state", Value::from("off"))],
                [("time", 0.5), ("health", 0.0), ("mental", 0.0)],
            ),
        ];

        Self {
            places,
            items,
            fully_connected: true,
            move_cost: DEFAULT_MOVE_COST,
            edges: vec![
                EdgeConfig::new("sofa", "meja", 0.5),
                EdgeConfig::new("tv", "piano", 0.5),
            ],
            gestures,
            agent,
            actions,
            planner: PlannerConfig::default(),
        }
    }
}
