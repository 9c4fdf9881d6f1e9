//! # Action Module
//!
//! An [`Action`] is a named operation with:
//!
//! * named [`Precondition`]s, all of which must hold for the action to apply
//! * typed [`Effect`]s, resolved once at construction time
//! * per-resource costs: `"time"` accumulates, every other resource is consumed
//!
//! Applying an action is pure: [`Action::apply`] returns a new
//! `(AgentState, WorldState)` pair and leaves its inputs untouched. The
//! executor commits plan steps with [`Action::apply_in_place`].
//!
//! ## Basic Usage
//!
//! ```
//! use npc_goap::condition::{hands_free, item_at_location};
//! use npc_goap::{Action, AgentState, Effect, Place, WorldState};
//!
//! let agent = AgentState::new()
//!     .with_upper_slot("hold", "none")
//!     .with_lower_slot("location", "meja")
//!     .with_resource("time", 0.0)
//!     .with_resource("health", 10.0);
//! let mut world = WorldState::new();
//! world.add_place(Place::new("meja").with_item("snack"));
//!
//! let pick = Action::new("pick_snack")
//!     .with_precondition("hold", hands_free())
//!     .with_precondition("item_at_location", item_at_location("snack"))
//!     .with_effect(Effect::classify("hold", "snack", &agent))
//!     .with_effect(Effect::classify("pickup_item", "snack", &agent))
//!     .with_cost("time", 0.5).unwrap()
//!     .with_cost("health", 1.0).unwrap();
//!
//! assert!(pick.is_applicable(&agent, &world));
//! let (agent2, world2) = pick.apply(&agent, &world);
//! assert!(agent2.carries("snack"));
//! assert_eq!(agent2.resource("time"), Some(0.5));
//! assert_eq!(agent2.resource("health"), Some(9.0));
//! assert!(!world2.place("meja").unwrap().contains("snack"));
//!
//! // The inputs are unchanged
//! assert!(world.place("meja").unwrap().contains("snack"));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use log::debug;

use crate::condition::{Condition, Precondition};
use crate::effect::{Effect, EffectTarget};
use crate::state::{normalize, AgentState, WorldState, TIME};
use crate::{GoapError, Result};

/// A named, parameterized operation the agent can perform.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Unique (case-insensitive) name within a catalog
    pub name: String,
    pub preconditions: Vec<Precondition>,
    /// Effects, applied in order
    pub effects: Vec<Effect>,
    /// Resource name to non-negative delta
    pub costs: BTreeMap<String, f64>,
}

impl Action {
    /// Creates an action with no preconditions, effects or costs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            preconditions: Vec::new(),
            effects: Vec::new(),
            costs: BTreeMap::new(),
        }
    }

    pub fn with_precondition(mut self, name: impl Into<String>, condition: Condition) -> Self {
        self.preconditions.push(Precondition::new(name, condition));
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Adds a cost entry.
    ///
    /// # Errors
    ///
    /// Returns `GoapError::InvalidActionCost` if `amount` is negative or not finite.
    pub fn with_cost(mut self, resource: &str, amount: f64) -> Result<Self> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(GoapError::InvalidActionCost(format!(
                "{}: {}={}",
                self.name, resource, amount
            )));
        }
        self.costs.insert(normalize(resource), amount);
        Ok(self)
    }

    pub fn cost(&self, resource: &str) -> Option<f64> {
        self.costs.get(&normalize(resource)).copied()
    }

    /// Name of the first precondition that does not hold, if any.
    pub fn failing_precondition(&self, agent: &AgentState, world: &WorldState) -> Option<&str> {
        self.preconditions
            .iter()
            .find(|p| !p.holds(agent, world))
            .map(|p| p.name.as_str())
    }

    /// Whether every precondition holds and no consumable resource would go negative.
    ///
    /// A positive cost on a resource the agent does not have makes the action
    /// inapplicable.
    pub fn is_applicable(&self, agent: &AgentState, world: &WorldState) -> bool {
        if self.failing_precondition(agent, world).is_some() {
            return false;
        }
        self.costs
            .iter()
            .filter(|(resource, _)| resource.as_str() != TIME)
            .all(|(resource, &amount)| match agent.resource(resource) {
                Some(current) => current - amount >= 0.0,
                None => amount == 0.0,
            })
    }

    /// Returns the state that results from performing this action.
    pub fn apply(&self, agent: &AgentState, world: &WorldState) -> (AgentState, WorldState) {
        let mut agent = agent.clone();
        let mut world = world.clone();
        self.apply_in_place(&mut agent, &mut world);
        (agent, world)
    }

    /// Applies effects, then costs, directly to the given state.
    pub fn apply_in_place(&self, agent: &mut AgentState, world: &mut WorldState) {
        for effect in &self.effects {
            effect.apply(agent, world);
        }
        for (resource, &amount) in &self.costs {
            if resource == TIME {
                if !agent.adjust_resource(TIME, amount) {
                    agent.set_resource(TIME, amount);
                }
            } else if !agent.adjust_resource(resource, -amount) && amount != 0.0 {
                debug!("Action '{}' costs unknown resource '{}'", self.name, resource);
            }
        }
    }

    /// Cost used by the planner: the sum of all cost entries, with "time"
    /// scaled by `time_weight`.
    pub fn incremental_cost(&self, time_weight: f64) -> f64 {
        self.costs
            .iter()
            .map(|(resource, amount)| {
                if resource == TIME {
                    amount.abs() * time_weight
                } else {
                    amount.abs()
                }
            })
            .sum()
    }

    /// The first effect writing to a target matching `predicate`.
    pub fn find_effect(&self, predicate: impl Fn(&EffectTarget) -> bool) -> Option<&Effect> {
        self.effects.iter().find(|e| predicate(&e.target))
    }

    pub fn has_effects(&self) -> bool {
        !self.effects.is_empty()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let conditions: Vec<&str> = self.preconditions.iter().map(|p| p.name.as_str()).collect();
        let effects: Vec<String> = self.effects.iter().map(ToString::to_string).collect();
        let costs: Vec<String> = self
            .costs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(
            f,
            "{} [pre: {}] [eff: {}] [cost: {}]",
            self.name,
            conditions.join(", "),
            effects.join(", "),
            costs.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{hands_free, location_is, pose_is};
    use crate::state::Place;

    fn agent() -> AgentState {
        AgentState::new()
            .with_upper_slot("hold", "none")
            .with_lower_slot("location", "picture")
            .with_lower_slot("pose", "stand")
            .with_resource("time", 0.0)
            .with_resource("health", 2.0)
            .with_resource("mental", 2.0)
    }

    fn world() -> WorldState {
        let mut world = WorldState::new();
        world.add_place(Place::new("picture"));
        world.add_place(Place::new("sofa").with_item("pillow"));
        world
    }

    fn move_to_sofa() -> Action {
        let schema = agent();
        Action::new("move_picture_to_sofa")
            .with_precondition("pose", pose_is("stand"))
            .with_precondition("location", location_is("picture"))
            .with_effect(Effect::classify("location", "sofa", &schema))
            .with_cost("time", 1.5)
            .unwrap()
            .with_cost("health", 1.5)
            .unwrap()
    }

    #[test]
    fn test_create_action() {
        let action = Action::new("think");
        assert_eq!(action.name, "think");
        assert!(action.preconditions.is_empty());
        assert!(!action.has_effects());
        assert!(action.costs.is_empty());
    }

    #[test]
    fn test_negative_cost_rejected() {
        let result = Action::new("bad").with_cost("health", -1.0);
        assert!(matches!(result, Err(GoapError::InvalidActionCost(_))));
        let result = Action::new("bad").with_cost("time", f64::NAN);
        assert!(matches!(result, Err(GoapError::InvalidActionCost(_))));
    }

    #[test]
    fn test_applicability_checks_preconditions() {
        let action = move_to_sofa();
        assert!(action.is_applicable(&agent(), &world()));

        let seated = agent().with_lower_slot("pose", "sit");
        assert!(!action.is_applicable(&seated, &world()));
        assert_eq!(action.failing_precondition(&seated, &world()), Some("pose"));
    }

    #[test]
    fn test_applicability_checks_resources() {
        let action = move_to_sofa();
        let tired = agent().with_resource("health", 1.0);
        assert!(!action.is_applicable(&tired, &world()));

        let exact = agent().with_resource("health", 1.5);
        assert!(action.is_applicable(&exact, &world()));
    }

    #[test]
    fn test_time_cost_never_blocks() {
        let action = Action::new("wait").with_cost("time", 100.0).unwrap();
        assert!(action.is_applicable(&agent(), &world()));
    }

    #[test]
    fn test_missing_resource_blocks_positive_cost_only() {
        let action = Action::new("focus").with_cost("mana", 1.0).unwrap();
        assert!(!action.is_applicable(&agent(), &world()));
        let free = Action::new("focus").with_cost("mana", 0.0).unwrap();
        assert!(free.is_applicable(&agent(), &world()));
    }

    #[test]
    fn test_apply_effects_then_costs() {
        let action = move_to_sofa();
        let (a, w) = action.apply(&agent(), &world());
        assert_eq!(a.location(), Some("sofa"));
        assert_eq!(a.resource("time"), Some(1.5));
        assert_eq!(a.resource("health"), Some(0.5));
        assert_eq!(a.resource("mental"), Some(2.0));
        assert_eq!(w, world());
    }

    #[test]
    fn test_apply_does_not_mutate_inputs() {
        let original = agent();
        let _ = move_to_sofa().apply(&original, &world());
        assert_eq!(original, agent());
    }

    #[test]
    fn test_effect_restores_resource_before_cost() {
        let schema = agent();
        let eat = Action::new("use_snack")
            .with_effect(Effect::classify("health", 100, &schema))
            .with_cost("health", 1.0)
            .unwrap();
        let (a, _) = eat.apply(&agent(), &world());
        assert_eq!(a.resource("health"), Some(99.0));
    }

    #[test]
    fn test_incremental_cost() {
        let action = move_to_sofa();
        assert_eq!(action.incremental_cost(1.0), 3.0);
        assert_eq!(action.incremental_cost(2.0), 4.5);
    }

    #[test]
    fn test_generic_flag_effect() {
        let schema = agent();
        let wave = Action::new("clapping")
            .with_precondition("hold", hands_free())
            .with_effect(Effect::classify("did_clapping", true, &schema));
        let (a, _) = wave.apply(&agent(), &world());
        assert!(a.flag_is_true("did_clapping"));
    }
}
