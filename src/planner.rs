//! # Planner Module
//!
//! The planner is the central component of the GOAP system, responsible for:
//! - Finding minimum-cost sequences of actions that satisfy every active goal
//! - Coordinating between agent/world state and the action catalog
//! - Delegating the state-space search to a [`SearchAlgorithm`]
//!
//! Planning never mutates the state it is given: every candidate action is
//! applied to a copy. A returned [`ActionSequence`] can be replayed step by
//! step from the same start state with every step applicable.
//!
//! ## Basic Usage
//!
//! ```
//! use npc_goap::{GoalCompiler, Planner, WorldConfig};
//!
//! // Build the default living-room world and its actions
//! let config = WorldConfig::default();
//! let (agent, world) = config.initial_state();
//! let catalog = config.build_catalog(&agent, &world).unwrap();
//!
//! // Turn a sentence into a goal
//! let compiler = GoalCompiler::new().unwrap();
//! let goal = compiler.compile("Go to sofa", &catalog, &world, 1.0).unwrap();
//!
//! // Plan
//! let planner = Planner::new(catalog);
//! let plan = planner.plan(&[goal], &agent, &world).unwrap();
//! assert_eq!(plan.names(), vec!["move_picture_to_sofa"]);
//! ```

use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::catalog::ActionCatalog;
use crate::search::{BestFirstSearch, SearchAlgorithm};
use crate::state::{AgentState, PlanningState, WorldState};
use crate::{Action, GoapError, Goal, Result};

/// Search limits and cost weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Maximum number of nodes expanded before giving up
    pub max_expansions: usize,
    /// Multiplier applied to the "time" cost entry
    pub time_weight: f64,
    /// Include resource values in the visited-state signature
    pub dedup_on_resources: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_expansions: 20_000,
            time_weight: 1.0,
            dedup_on_resources: false,
        }
    }
}

/// One action of a plan with the cost it incurs at that point.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    pub action: Action,
    pub cost: f64,
}

impl PlannedStep {
    pub fn new(action: Action, cost: f64) -> Self {
        Self { action, cost }
    }
}

/// The planner's output: an ordered list of steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionSequence {
    steps: Vec<PlannedStep>,
}

impl ActionSequence {
    pub fn new(steps: Vec<PlannedStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PlannedStep] {
        &self.steps
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlannedStep> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn total_cost(&self) -> f64 {
        self.steps.iter().map(|s| s.cost).sum()
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.action.name.as_str()).collect()
    }

    /// Replays the plan from the given state, checking applicability before
    /// every step, and returns the final state.
    ///
    /// # Errors
    ///
    /// Returns `GoapError::StepNotApplicable` for the first step whose
    /// preconditions or resources are not met.
    pub fn simulate(&self, agent: &AgentState, world: &WorldState) -> Result<PlanningState> {
        let mut agent = agent.clone();
        let mut world = world.clone();
        for (index, step) in self.steps.iter().enumerate() {
            if !step.action.is_applicable(&agent, &world) {
                return Err(GoapError::StepNotApplicable {
                    step: index,
                    action: step.action.name.clone(),
                });
            }
            step.action.apply_in_place(&mut agent, &mut world);
        }
        Ok(PlanningState::new(agent, world))
    }
}

impl<'a> IntoIterator for &'a ActionSequence {
    type Item = &'a PlannedStep;
    type IntoIter = std::slice::Iter<'a, PlannedStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl fmt::Display for ActionSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "(empty plan)");
        }
        write!(f, "{} (cost {})", self.names().join(" -> "), self.total_cost())
    }
}

/// The GOAP planner: finds the cheapest action sequence satisfying all goals.
///
/// The planner owns the [`ActionCatalog`] it plans over and a search
/// algorithm ([`BestFirstSearch`] by default).
///
/// # Examples
///
/// Using uniform-cost search instead of the weighted heuristic:
///
/// ```
/// use npc_goap::{Planner, UniformCostSearch, WorldConfig};
///
/// let config = WorldConfig::default();
/// let (agent, world) = config.initial_state();
/// let catalog = config.build_catalog(&agent, &world).unwrap();
/// let planner = Planner::with_search_algorithm(catalog, Box::new(UniformCostSearch));
/// assert!(planner.plan(&[], &agent, &world).unwrap().is_empty());
/// ```
pub struct Planner {
    catalog: ActionCatalog,
    config: PlannerConfig,
    search_algorithm: Box<dyn SearchAlgorithm>,
}

impl Planner {
    /// Creates a planner with the default configuration and best-first search.
    pub fn new(catalog: ActionCatalog) -> Self {
        Self::with_config(catalog, PlannerConfig::default())
    }

    pub fn with_config(catalog: ActionCatalog, config: PlannerConfig) -> Self {
        Self {
            catalog,
            config,
            search_algorithm: Box::new(BestFirstSearch::default()),
        }
    }

    /// Creates a planner with a custom search algorithm.
    pub fn with_search_algorithm(
        catalog: ActionCatalog,
        search_algorithm: Box<dyn SearchAlgorithm>,
    ) -> Self {
        Self {
            catalog,
            config: PlannerConfig::default(),
            search_algorithm,
        }
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Finds a plan satisfying every goal at once, starting from the given state.
    ///
    /// The inputs are never modified. With no goals the plan is empty.
    ///
    /// # Errors
    ///
    /// * `GoapError::NoPlanFound` if no reachable state satisfies all goals
    /// * `GoapError::SearchBudgetExhausted` if the expansion budget runs out first
    pub fn plan(&self, goals: &[Goal], agent: &AgentState, world: &WorldState) -> Result<ActionSequence> {
        if goals.is_empty() {
            debug!("No goals given, returning an empty plan");
            return Ok(ActionSequence::default());
        }

        let goal_names: Vec<&str> = goals.iter().map(|g| g.name.as_str()).collect();
        let start = PlanningState::new(agent.clone(), world.clone());
        let steps = self
            .search_algorithm
            .search(self.catalog.actions(), goals, &start, &self.config)
            .map_err(|e| {
                info!("Planning failed for [{}]: {}", goal_names.join(", "), e);
                e
            })?;

        let plan = ActionSequence::new(steps);
        info!("Plan created for [{}]: {}", goal_names.join(", "), plan);
        Ok(plan)
    }
}

/// Cloning keeps the catalog and configuration but resets the search
/// algorithm to [`BestFirstSearch`], since trait objects cannot be cloned.
impl Clone for Planner {
    fn clone(&self) -> Self {
        Self::with_config(self.catalog.clone(), self.config.clone())
    }
}
