//! The action registry and the factories that populate it.
//!
//! A catalog is built once from the world definition: one move action per
//! connected pair of places, one gesture action per gesture name, pick/drop
//! actions per item, a `use_<item>` action per usable item, and any custom
//! [`ActionTemplate`]s. It is immutable during planning.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::condition::{carries, hands_free, holding, item_at_location, location_is, pose_is, Condition};
use crate::effect::{Effect, DROP_ITEM, PICKUP_ITEM};
use crate::state::{normalize, AgentState, Item, WorldState, EMPTY_HAND, TIME};
use crate::value::Value;
use crate::{GoapError, Result};

const STAND: &str = "stand";

/// Builds `move_<from>_to_<to>`: standing at `from`, ends at `to`.
///
/// `cost` is charged to both time and health; mental is untouched.
pub fn move_action(from: &str, to: &str, cost: f64, schema: &AgentState) -> Result<Action> {
    let (from, to) = (normalize(from), normalize(to));
    Action::new(format!("move_{}_to_{}", from, to))
        .with_precondition("pose", pose_is(STAND))
        .with_precondition("location", location_is(&from))
        .with_effect(Effect::classify("location", to.as_str(), schema))
        .with_cost(TIME, cost)?
        .with_cost("health", cost)?
        .with_cost("mental", 0.0)
}

/// Builds a gesture action named after the lower-cased gesture.
pub fn gesture_action(gesture: &str, schema: &AgentState) -> Result<Action> {
    let name = normalize(gesture);
    Action::new(name.clone())
        .with_precondition("hold", hands_free())
        .with_precondition("pose", pose_is(STAND))
        .with_effect(Effect::classify(&format!("did_{}", name), true, schema))
        .with_cost(TIME, 1.0)?
        .with_cost("health", 1.0)?
        .with_cost("mental", 1.0)
}

pub fn pick_action(item: &str, schema: &AgentState) -> Result<Action> {
    let item = normalize(item);
    Action::new(format!("pick_{}", item))
        .with_precondition("hold", hands_free())
        .with_precondition("item_at_location", item_at_location(&item))
        .with_effect(Effect::classify("hold", item.as_str(), schema))
        .with_effect(Effect::classify(PICKUP_ITEM, item.as_str(), schema))
        .with_cost(TIME, 0.5)?
        .with_cost("health", 1.0)?
        .with_cost("mental", 1.0)
}

pub fn drop_action(item: &str, schema: &AgentState) -> Result<Action> {
    let item = normalize(item);
    Action::new(format!("drop_{}", item))
        .with_precondition("hold", holding(&item))
        .with_precondition("pose", pose_is(STAND))
        .with_effect(Effect::classify("hold", EMPTY_HAND, schema))
        .with_effect(Effect::classify(DROP_ITEM, item.as_str(), schema))
        .with_cost(TIME, 0.5)?
        .with_cost("health", 1.0)?
        .with_cost("mental", 1.0)
}

/// Builds `use_<item>` from the item's "use" behavior.
///
/// Returns `ItemNotUsable` when the item has no non-empty "use" behavior.
/// The item stays in the inventory after use.
pub fn use_action(item: &Item, schema: &AgentState) -> Result<Action> {
    let effects = item
        .use_effects()
        .ok_or_else(|| GoapError::ItemNotUsable(item.name().to_string()))?;
    let mut action = Action::new(format!("use_{}", item.name()))
        .with_precondition(format!("has_{}", item.name()), carries(item.name()));
    for (key, value) in effects {
        action = action.with_effect(Effect::classify(key, value.clone(), schema));
    }
    action
        .with_effect(Effect::classify(&format!("used_{}", item.name()), true, schema))
        .with_cost(TIME, 0.5)
}

/// A declarative action definition, loadable from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTemplate {
    pub name: String,
    /// Precondition name to test
    #[serde(default)]
    pub conditions: BTreeMap<String, Condition>,
    /// Effect address to value
    #[serde(default)]
    pub effects: BTreeMap<String, Value>,
    #[serde(default)]
    pub costs: BTreeMap<String, f64>,
}

impl ActionTemplate {
    /// Resolves the template against the agent schema.
    pub fn build(&self, schema: &AgentState) -> Result<Action> {
        let mut action = Action::new(normalize(&self.name));
        for (name, condition) in &self.conditions {
            action = action.with_precondition(name.clone(), condition.clone());
        }
        for (key, value) in &self.effects {
            action = action.with_effect(Effect::classify(key, value.clone(), schema));
        }
        for (resource, amount) in &self.costs {
            action = action.with_cost(resource, *amount)?;
        }
        Ok(action)
    }
}

/// An ordered, name-indexed set of actions plus the known gesture names.
#[derive(Debug, Clone, Default)]
pub struct ActionCatalog {
    actions: Vec<Action>,
    index: HashMap<String, usize>,
    gestures: Vec<String>,
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an action. Names are unique, compared case-insensitively.
    pub fn add(&mut self, action: Action) -> Result<()> {
        let key = normalize(&action.name);
        if self.index.contains_key(&key) {
            return Err(GoapError::DuplicateAction(action.name));
        }
        self.index.insert(key, self.actions.len());
        self.actions.push(action);
        Ok(())
    }

    pub fn with_action(mut self, action: Action) -> Result<Self> {
        self.add(action)?;
        Ok(self)
    }

    pub fn add_move(&mut self, from: &str, to: &str, cost: f64, schema: &AgentState) -> Result<()> {
        self.add(move_action(from, to, cost, schema)?)
    }

    /// Registers a gesture name and its action.
    pub fn add_gesture(&mut self, gesture: &str, schema: &AgentState) -> Result<()> {
        self.add(gesture_action(gesture, schema)?)?;
        self.gestures.push(gesture.trim().to_string());
        Ok(())
    }

    /// Adds pick and drop actions for every item in the world.
    pub fn add_item_actions(&mut self, world: &WorldState, schema: &AgentState) -> Result<()> {
        for item in world.items() {
            self.add(pick_action(item.name(), schema)?)?;
            self.add(drop_action(item.name(), schema)?)?;
        }
        Ok(())
    }

    /// Adds `use_<item>` for every usable item that has no such action yet.
    pub fn add_use_actions(&mut self, world: &WorldState, schema: &AgentState) -> Result<()> {
        for item in world.items().filter(|i| i.use_effects().is_some()) {
            if !self.contains(&format!("use_{}", item.name())) {
                self.add(use_action(item, schema)?)?;
            }
        }
        Ok(())
    }

    pub fn add_template(&mut self, template: &ActionTemplate, schema: &AgentState) -> Result<()> {
        self.add(template.build(schema)?)
    }

    /// Case-insensitive lookup by name.
    pub fn get(&self, name: &str) -> Option<&Action> {
        self.index.get(&normalize(name)).map(|&i| &self.actions[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&normalize(name))
    }

    pub fn is_gesture(&self, name: &str) -> bool {
        let name = normalize(name);
        self.gestures.iter().any(|g| normalize(g) == name)
    }

    pub fn gestures(&self) -> impl Iterator<Item = &str> {
        self.gestures.iter().map(String::as_str)
    }

    /// Actions in insertion order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
