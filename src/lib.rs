mod action;
mod agent;
mod catalog;
mod compiler;
pub mod condition;
mod config;
mod effect;
mod error;
mod executor;
mod goal;
mod planner;
mod search;
mod snapshot;
mod state;
mod value;
mod visualizer;

pub use action::Action;
pub use agent::{NpcAgent, PlanningRequest};
pub use catalog::{
    drop_action, gesture_action, move_action, pick_action, use_action, ActionCatalog, ActionTemplate,
};
pub use compiler::GoalCompiler;
pub use condition::{Condition, Precondition};
pub use config::{AgentConfig, EdgeConfig, ItemConfig, PlaceConfig, WorldConfig};
pub use effect::{Effect, EffectTarget, DROP_ITEM, PICKUP_ITEM, RESOURCE_EPSILON, USE_ITEM};
pub use error::{GoapError, Result};
pub use executor::{
    CancelHandle, Effector, EffectorResult, ExecutionOutcome, ExecutionReport, ExecutionState,
    NoopEffector, PlanExecutor, StepKind,
};
pub use goal::{Goal, GoalCondition, StateOwner};
pub use planner::{ActionSequence, PlannedStep, Planner, PlannerConfig};
pub use search::{
    BestFirstSearch, HeuristicStrategy, SearchAlgorithm, UniformCostSearch, WeightedGoalHeuristic,
    ZeroHeuristic,
};
pub use snapshot::{ItemSnapshot, PlaceSnapshot, StatusSnapshot, WorldSnapshot};
pub use state::{AgentState, Item, Place, PlanningState, WorldState, EMPTY_HAND, TIME};
pub use value::Value;
pub use visualizer::GoapVisualizer;
