//! Planning targets.
//!
//! A [`Goal`] pairs a satisfaction test ([`GoalCondition`]) with a weight and
//! an optional effect hint. Goals are usually produced by the
//! [`GoalCompiler`](crate::compiler::GoalCompiler) but can be built directly:
//!
//! ```
//! use npc_goap::{AgentState, Goal, GoalCondition, WorldState};
//!
//! let goal = Goal::new("Go_to_sofa", GoalCondition::LocationIs { place: "sofa".into() })
//!     .with_weight(2.0);
//! let agent = AgentState::new().with_lower_slot("location", "Sofa");
//! assert!(goal.is_satisfied(&agent, &WorldState::new()));
//! ```

use std::fmt;

use crate::action::Action;
use crate::effect::Effect;
use crate::state::{AgentState, WorldState};

/// Whose flag a `Change ... of <object> to ...` goal addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateOwner {
    /// Agent slots first, then agent flags
    Agent,
    Place(String),
    Item(String),
}

/// The satisfaction test of a goal.
#[derive(Debug, Clone, PartialEq)]
pub enum GoalCondition {
    /// An agent flag is truthy (`used_<item>`, `did_<action>`)
    FlagTrue { key: String },
    /// Optionally at `location`, every effect is already reflected in state
    EffectsApplied {
        location: Option<String>,
        effects: Vec<Effect>,
    },
    /// A named flag of an object equals `value` as case-insensitive text
    StateEquals {
        owner: StateOwner,
        key: String,
        value: String,
    },
    LocationIs { place: String },
    Carries { item: String },
    /// The agent is at `place`, does not carry `item`, and `place` holds it
    Dropped { item: String, place: String },
}

impl GoalCondition {
    pub fn evaluate(&self, agent: &AgentState, world: &WorldState) -> bool {
        match self {
            GoalCondition::FlagTrue { key } => agent.flag_is_true(key),
            GoalCondition::EffectsApplied { location, effects } => {
                location
                    .as_deref()
                    .map_or(true, |place| agent.slot_matches("location", place))
                    && effects.iter().all(|e| e.is_reflected_in(agent, world))
            }
            GoalCondition::StateEquals { owner, key, value } => {
                let current = match owner {
                    StateOwner::Agent => agent.slot(key).or_else(|| agent.flag(key)),
                    StateOwner::Place(place) => world.place(place).and_then(|p| p.flag(key)),
                    StateOwner::Item(item) => world.item(item).and_then(|i| i.flag(key)),
                };
                current.map_or(false, |v| v.matches_text(value))
            }
            GoalCondition::LocationIs { place } => agent.slot_matches("location", place),
            GoalCondition::Carries { item } => agent.carries(item),
            GoalCondition::Dropped { item, place } => {
                agent.slot_matches("location", place)
                    && !agent.carries(item)
                    && world.place(place).map_or(false, |p| p.contains(item))
            }
        }
    }
}

/// A weighted planning target.
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub name: String,
    pub condition: GoalCondition,
    /// Relative priority; only biases search order
    pub weight: f64,
    /// Effects of the action most likely to achieve this goal
    pub effect_hint: Vec<Effect>,
}

impl Goal {
    pub fn new(name: impl Into<String>, condition: GoalCondition) -> Self {
        Self {
            name: name.into(),
            condition,
            weight: 1.0,
            effect_hint: Vec::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_effect_hint(mut self, effects: Vec<Effect>) -> Self {
        self.effect_hint = effects;
        self
    }

    pub fn is_satisfied(&self, agent: &AgentState, world: &WorldState) -> bool {
        self.condition.evaluate(agent, world)
    }

    /// Whether `action` produces any of the hinted effects.
    pub fn is_hinted_by(&self, action: &Action) -> bool {
        !self.effect_hint.is_empty() && action.effects.iter().any(|e| self.effect_hint.contains(e))
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (weight {})", self.name, self.weight)
    }
}
