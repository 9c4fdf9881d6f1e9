//! # Executor Module
//!
//! Runs a planned [`ActionSequence`] step by step against the live agent and
//! world state. The executor only sequences: every physical effect (walking,
//! animating, toggling a TV) is delegated to an [`Effector`] supplied by the
//! embedding game layer.
//!
//! For each step the executor:
//!
//! 1. checks for a cancellation request
//! 2. classifies the action into a [`StepKind`] and calls the matching
//!    [`Effector`] method
//! 3. on success, commits the action's effects and costs to the live state,
//!    then yields to the runtime before the next step
//!
//! An effector failure aborts the plan. Steps already committed stay
//! committed; the returned [`ExecutionReport`] tells the caller how far the
//! plan got.
//!
//! ## States
//!
//! ```text
//! Idle -> Running{0} -> Running{1} -> ... -> Completed
//!                  \-> Aborted{step}
//!                  \-> Cancelled{step}
//! ```
//!
//! # Example
//!
//! ```
//! use npc_goap::{NoopEffector, PlanExecutor, PlanningState, WorldConfig};
//! use npc_goap::{GoalCompiler, Planner};
//! use tokio::sync::RwLock;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> npc_goap::Result<()> {
//! let config = WorldConfig::default();
//! let (agent, world) = config.initial_state();
//! let catalog = config.build_catalog(&agent, &world)?;
//! let goal = GoalCompiler::new()?.compile("Go to sofa", &catalog, &world, 1.0)?;
//! let plan = Planner::new(catalog.clone()).plan(&[goal], &agent, &world)?;
//!
//! let live = RwLock::new(PlanningState::new(agent, world));
//! let executor = PlanExecutor::new();
//! let report = executor.execute(&plan, &catalog, &NoopEffector, &live).await;
//! assert!(report.is_complete());
//! assert_eq!(live.read().await.agent.location(), Some("sofa"));
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::{Mutex, RwLock};

use crate::catalog::ActionCatalog;
use crate::effect::EffectTarget;
use crate::planner::ActionSequence;
use crate::state::{normalize, PlanningState};
use crate::{Action, GoapError, Value};

/// Result type of effector calls. The error is a human-readable reason.
pub type EffectorResult = std::result::Result<(), String>;

/// The boundary to whatever physically performs actions.
///
/// Each method resolves once the corresponding behavior has finished (or
/// failed). Implementations typically drive animation or navigation and
/// await its completion.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use npc_goap::{Action, Effector, EffectorResult, Value};
///
/// struct Puppet;
///
/// #[async_trait]
/// impl Effector for Puppet {
///     async fn begin_move(&self, target: &str) -> EffectorResult {
///         println!("walking to {}", target);
///         Ok(())
///     }
///     async fn perform_gesture(&self, gesture: &str) -> EffectorResult {
///         println!("playing {}", gesture);
///         Ok(())
///     }
///     async fn pick_up(&self, _item: &str) -> EffectorResult { Ok(()) }
///     async fn drop_item(&self, _item: &str) -> EffectorResult { Ok(()) }
///     async fn use_item(&self, _item: &str) -> EffectorResult { Ok(()) }
///     async fn set_place_flag(&self, _place: &str, _key: &str, _value: &Value) -> EffectorResult {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Effector: Send + Sync {
    /// Walks the agent to `target` and resolves on arrival
    async fn begin_move(&self, target: &str) -> EffectorResult;
    async fn perform_gesture(&self, gesture: &str) -> EffectorResult;
    async fn pick_up(&self, item: &str) -> EffectorResult;
    async fn drop_item(&self, item: &str) -> EffectorResult;
    async fn use_item(&self, item: &str) -> EffectorResult;
    async fn set_place_flag(&self, place: &str, key: &str, value: &Value) -> EffectorResult;

    /// Fallback for actions with no dedicated behavior (sitting, standing, ...)
    async fn perform(&self, action: &Action) -> EffectorResult {
        debug!("No dedicated behavior for '{}'", action.name);
        Ok(())
    }
}

/// An effector that succeeds immediately, logging every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEffector;

#[async_trait]
impl Effector for NoopEffector {
    async fn begin_move(&self, target: &str) -> EffectorResult {
        debug!("noop: move to {}", target);
        Ok(())
    }

    async fn perform_gesture(&self, gesture: &str) -> EffectorResult {
        debug!("noop: gesture {}", gesture);
        Ok(())
    }

    async fn pick_up(&self, item: &str) -> EffectorResult {
        debug!("noop: pick up {}", item);
        Ok(())
    }

    async fn drop_item(&self, item: &str) -> EffectorResult {
        debug!("noop: drop {}", item);
        Ok(())
    }

    async fn use_item(&self, item: &str) -> EffectorResult {
        debug!("noop: use {}", item);
        Ok(())
    }

    async fn set_place_flag(&self, place: &str, key: &str, value: &Value) -> EffectorResult {
        debug!("noop: set {}.{} = {}", place, key, value);
        Ok(())
    }
}

/// Which effector behavior a plan step maps to.
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Move { to: String },
    Gesture { name: String },
    PickUp { item: String },
    Drop { item: String },
    UseItem { item: String },
    PlaceFlag { place: String, key: String, value: Value },
    Generic,
}

impl StepKind {
    /// Classifies an action by what it writes, in order: a location change,
    /// a catalog gesture, a pickup, a drop, a `use_` action, a place flag.
    pub fn classify(action: &Action, catalog: &ActionCatalog) -> Self {
        if let Some(effect) =
            action.find_effect(|t| matches!(t, EffectTarget::AgentSlot(k) if k == "location"))
        {
            return StepKind::Move {
                to: effect.value.to_string(),
            };
        }
        if catalog.is_gesture(&action.name) {
            return StepKind::Gesture {
                name: normalize(&action.name),
            };
        }
        if let Some(effect) = action.find_effect(|t| matches!(t, EffectTarget::Pickup)) {
            return StepKind::PickUp {
                item: normalize(&effect.value.to_string()),
            };
        }
        if let Some(effect) = action.find_effect(|t| matches!(t, EffectTarget::Drop)) {
            return StepKind::Drop {
                item: normalize(&effect.value.to_string()),
            };
        }
        if let Some(item) = normalize(&action.name).strip_prefix("use_") {
            return StepKind::UseItem {
                item: item.to_string(),
            };
        }
        if let Some(effect) = action.find_effect(|t| matches!(t, EffectTarget::PlaceFlag { .. })) {
            if let EffectTarget::PlaceFlag { place, key } = &effect.target {
                return StepKind::PlaceFlag {
                    place: place.clone(),
                    key: key.clone(),
                    value: effect.value.clone(),
                };
            }
        }
        StepKind::Generic
    }

    async fn dispatch(&self, action: &Action, effector: &dyn Effector) -> EffectorResult {
        match self {
            StepKind::Move { to } => effector.begin_move(to).await,
            StepKind::Gesture { name } => effector.perform_gesture(name).await,
            StepKind::PickUp { item } => effector.pick_up(item).await,
            StepKind::Drop { item } => effector.drop_item(item).await,
            StepKind::UseItem { item } => effector.use_item(item).await,
            StepKind::PlaceFlag { place, key, value } => {
                effector.set_place_flag(place, key, value).await
            }
            StepKind::Generic => effector.perform(action).await,
        }
    }
}

/// The executor's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    /// Executing the step with this index
    Running { step: usize },
    Completed,
    Aborted { step: usize },
    Cancelled { step: usize },
}

impl ExecutionState {
    pub fn is_running(&self) -> bool {
        matches!(self, ExecutionState::Running { .. })
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionState::Idle => write!(f, "Idle"),
            ExecutionState::Running { step } => write!(f, "Running (step {})", step),
            ExecutionState::Completed => write!(f, "Completed"),
            ExecutionState::Aborted { step } => write!(f, "Aborted (step {})", step),
            ExecutionState::Cancelled { step } => write!(f, "Cancelled (step {})", step),
        }
    }
}

/// How a plan execution ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Completed,
    /// The step at `step` failed and was not committed
    Aborted {
        step: usize,
        action: String,
        reason: String,
    },
    /// Cancelled before the step at `step` started
    Cancelled { step: usize },
}

/// What an execution achieved.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    /// Names of the committed steps, in order
    pub completed_steps: Vec<String>,
    pub outcome: ExecutionOutcome,
}

impl ExecutionReport {
    pub fn is_complete(&self) -> bool {
        self.outcome == ExecutionOutcome::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Cancelled { .. })
    }

    /// The effector failure that aborted the plan, if any.
    pub fn error(&self) -> Option<GoapError> {
        match &self.outcome {
            ExecutionOutcome::Aborted { action, reason, .. } => Some(GoapError::Effector {
                action: action.clone(),
                reason: reason.clone(),
            }),
            _ => None,
        }
    }
}

/// A cloneable cancellation flag, checked by the executor between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Sequences plan steps through an [`Effector`] and commits them to the live
/// state.
pub struct PlanExecutor {
    state: Mutex<ExecutionState>,
    cancel: CancelHandle,
    check_applicability: bool,
}

impl PlanExecutor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ExecutionState::Idle),
            cancel: CancelHandle::new(),
            check_applicability: false,
        }
    }

    /// Re-checks each step against the live state before dispatching it, and
    /// aborts when it no longer applies.
    pub fn with_applicability_check(mut self, enabled: bool) -> Self {
        self.check_applicability = enabled;
        self
    }

    /// A handle that cancels the running (or next) execution.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub async fn state(&self) -> ExecutionState {
        *self.state.lock().await
    }

    async fn set_state(&self, state: ExecutionState) {
        *self.state.lock().await = state;
    }

    /// Executes `plan` against `live`.
    ///
    /// A pending cancellation request is cleared when execution starts. The
    /// live state is only write-locked while a successful step is committed,
    /// never across an effector call.
    pub async fn execute(
        &self,
        plan: &ActionSequence,
        catalog: &ActionCatalog,
        effector: &dyn Effector,
        live: &RwLock<PlanningState>,
    ) -> ExecutionReport {
        self.cancel.reset();
        info!("Executing plan: {}", plan);

        let mut completed_steps = Vec::with_capacity(plan.len());
        for (index, step) in plan.iter().enumerate() {
            let action = &step.action;

            if self.cancel.is_cancelled() {
                info!("Plan cancelled before step {} ('{}')", index, action.name);
                self.set_state(ExecutionState::Cancelled { step: index }).await;
                return ExecutionReport {
                    completed_steps,
                    outcome: ExecutionOutcome::Cancelled { step: index },
                };
            }

            self.set_state(ExecutionState::Running { step: index }).await;

            if self.check_applicability {
                let failing = {
                    let current = live.read().await;
                    if action.is_applicable(&current.agent, &current.world) {
                        None
                    } else {
                        Some(
                            action
                                .failing_precondition(&current.agent, &current.world)
                                .unwrap_or("insufficient resources")
                                .to_string(),
                        )
                    }
                };
                if let Some(reason) = failing {
                    warn!("Step {} ('{}') no longer applies: {}", index, action.name, reason);
                    return self.abort(completed_steps, index, action, reason).await;
                }
            }

            let kind = StepKind::classify(action, catalog);
            debug!("Step {}: '{}' as {:?}", index, action.name, kind);
            if let Err(reason) = kind.dispatch(action, effector).await {
                error!("Effector failed during '{}': {}", action.name, reason);
                return self.abort(completed_steps, index, action, reason).await;
            }

            {
                let mut current = live.write().await;
                let PlanningState { agent, world } = &mut *current;
                action.apply_in_place(agent, world);
            }
            debug!("Committed step {} ('{}')", index, action.name);
            completed_steps.push(action.name.clone());

            tokio::task::yield_now().await;
        }

        self.set_state(ExecutionState::Completed).await;
        info!("Plan completed ({} steps)", completed_steps.len());
        ExecutionReport {
            completed_steps,
            outcome: ExecutionOutcome::Completed,
        }
    }

    async fn abort(
        &self,
        completed_steps: Vec<String>,
        step: usize,
        action: &Action,
        reason: String,
    ) -> ExecutionReport {
        self.set_state(ExecutionState::Aborted { step }).await;
        info!(
            "Plan aborted at step {} ('{}') after {} committed steps",
            step,
            action.name,
            completed_steps.len()
        );
        ExecutionReport {
            completed_steps,
            outcome: ExecutionOutcome::Aborted {
                step,
                action: action.name.clone(),
                reason,
            },
        }
    }
}

impl Default for PlanExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::planner::PlannedStep;
    use std::sync::Mutex as StdMutex;

    /// Records every call; fails on the configured action.
    #[derive(Default)]
    struct RecordingEffector {
        calls: StdMutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl RecordingEffector {
        fn failing_on(call: &str) -> Self {
            Self {
                calls: StdMutex::new(Vec::new()),
                fail_on: Some(call.to_string()),
            }
        }

        fn record(&self, call: String) -> EffectorResult {
            let fail = self.fail_on.as_deref() == Some(call.as_str());
            self.calls.lock().unwrap().push(call);
            if fail {
                Err("blocked".to_string())
            } else {
                Ok(())
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Effector for RecordingEffector {
        async fn begin_move(&self, target: &str) -> EffectorResult {
            self.record(format!("move:{}", target))
        }
        async fn perform_gesture(&self, gesture: &str) -> EffectorResult {
            self.record(format!("gesture:{}", gesture))
        }
        async fn pick_up(&self, item: &str) -> EffectorResult {
            self.record(format!("pick:{}", item))
        }
        async fn drop_item(&self, item: &str) -> EffectorResult {
            self.record(format!("drop:{}", item))
        }
        async fn use_item(&self, item: &str) -> EffectorResult {
            self.record(format!("use:{}", item))
        }
        async fn set_place_flag(&self, place: &str, key: &str, value: &Value) -> EffectorResult {
            self.record(format!("flag:{}:{}:{}", place, key, value))
        }
        async fn perform(&self, action: &Action) -> EffectorResult {
            self.record(format!("perform:{}", action.name))
        }
    }

    fn setup() -> (ActionCatalog, RwLock<PlanningState>) {
        let config = WorldConfig::default();
        let (agent, world) = config.initial_state();
        let catalog = config.build_catalog(&agent, &world).unwrap();
        (catalog, RwLock::new(PlanningState::new(agent, world)))
    }

    fn sequence(catalog: &ActionCatalog, names: &[&str]) -> ActionSequence {
        ActionSequence::new(
            names
                .iter()
                .map(|name| {
                    let action = catalog.get(name).unwrap().clone();
                    let cost = action.incremental_cost(1.0);
                    PlannedStep::new(action, cost)
                })
                .collect(),
        )
    }

    #[test]
    fn test_classify_steps() {
        let (catalog, _) = setup();
        let kind = |name: &str| StepKind::classify(catalog.get(name).unwrap(), &catalog);

        assert_eq!(kind("move_picture_to_sofa"), StepKind::Move { to: "sofa".into() });
        assert_eq!(kind("thinking"), StepKind::Gesture { name: "thinking".into() });
        assert_eq!(kind("pick_snack"), StepKind::PickUp { item: "snack".into() });
        assert_eq!(kind("drop_snack"), StepKind::Drop { item: "snack".into() });
        assert_eq!(kind("use_snack"), StepKind::UseItem { item: "snack".into() });
        assert_eq!(
            kind("set_tv_state_on"),
            StepKind::PlaceFlag {
                place: "tv".into(),
                key: "tv_state".into(),
                value: Value::from("on"),
            }
        );
        assert_eq!(kind("sit_sofa"), StepKind::Generic);
    }

    #[test]
    fn test_cancel_handle_shared() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        clone.cancel();
        assert!(handle.is_cancelled());
        handle.reset();
        assert!(!clone.is_cancelled());
    }

    #[tokio::test]
    async fn test_execute_commits_every_step() {
        let (catalog, live) = setup();
        let plan = sequence(&catalog, &["move_picture_to_meja", "pick_snack", "use_snack"]);
        let effector = RecordingEffector::default();
        let executor = PlanExecutor::new();

        let report = executor.execute(&plan, &catalog, &effector, &live).await;

        assert!(report.is_complete());
        assert_eq!(report.completed_steps.len(), 3);
        assert_eq!(effector.calls(), vec!["move:meja", "pick:snack", "use:snack"]);
        assert_eq!(executor.state().await, ExecutionState::Completed);

        let state = live.read().await;
        assert_eq!(state.agent.location(), Some("meja"));
        assert!(state.agent.carries("snack"));
        assert!(state.agent.flag_is_true("used_snack"));
        assert!(!state.world.place("meja").unwrap().contains("snack"));
    }

    #[tokio::test]
    async fn test_effector_failure_keeps_committed_steps() {
        let (catalog, live) = setup();
        let plan = sequence(&catalog, &["move_picture_to_meja", "pick_snack", "use_snack"]);
        let effector = RecordingEffector::failing_on("pick:snack");
        let executor = PlanExecutor::new();

        let report = executor.execute(&plan, &catalog, &effector, &live).await;

        assert_eq!(report.completed_steps, vec!["move_picture_to_meja"]);
        assert!(matches!(
            report.outcome,
            ExecutionOutcome::Aborted { step: 1, ref reason, .. } if reason == "blocked"
        ));
        assert!(matches!(report.error(), Some(GoapError::Effector { .. })));
        assert_eq!(executor.state().await, ExecutionState::Aborted { step: 1 });

        let state = live.read().await;
        assert_eq!(state.agent.location(), Some("meja"));
        assert!(!state.agent.carries("snack"));
        assert!(state.world.place("meja").unwrap().contains("snack"));
    }

    #[tokio::test]
    async fn test_cancel_before_start_is_cleared() {
        let (catalog, live) = setup();
        let plan = sequence(&catalog, &["move_picture_to_sofa"]);
        let executor = PlanExecutor::new();
        executor.cancel_handle().cancel();

        let report = executor.execute(&plan, &catalog, &NoopEffector, &live).await;
        assert!(report.is_complete());
    }

    /// Cancels through the handle while performing its first move.
    struct CancellingEffector(CancelHandle);

    #[async_trait]
    impl Effector for CancellingEffector {
        async fn begin_move(&self, _target: &str) -> EffectorResult {
            self.0.cancel();
            Ok(())
        }
        async fn perform_gesture(&self, _gesture: &str) -> EffectorResult {
            Ok(())
        }
        async fn pick_up(&self, _item: &str) -> EffectorResult {
            Ok(())
        }
        async fn drop_item(&self, _item: &str) -> EffectorResult {
            Ok(())
        }
        async fn use_item(&self, _item: &str) -> EffectorResult {
            Ok(())
        }
        async fn set_place_flag(&self, _place: &str, _key: &str, _value: &Value) -> EffectorResult {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancel_between_steps() {
        let (catalog, live) = setup();
        let plan = sequence(&catalog, &["move_picture_to_meja", "pick_snack"]);
        let executor = PlanExecutor::new();
        let effector = CancellingEffector(executor.cancel_handle());

        let report = executor.execute(&plan, &catalog, &effector, &live).await;

        assert!(report.is_cancelled());
        assert_eq!(report.completed_steps, vec!["move_picture_to_meja"]);
        assert_eq!(executor.state().await, ExecutionState::Cancelled { step: 1 });
        assert!(!live.read().await.agent.carries("snack"));
    }

    #[tokio::test]
    async fn test_applicability_check_aborts_stale_step() {
        let (catalog, live) = setup();
        // pick_snack from "picture" cannot apply: the snack is at meja
        let plan = sequence(&catalog, &["pick_snack"]);
        let effector = RecordingEffector::default();
        let executor = PlanExecutor::new().with_applicability_check(true);

        let report = executor.execute(&plan, &catalog, &effector, &live).await;

        assert!(matches!(report.outcome, ExecutionOutcome::Aborted { step: 0, .. }));
        assert!(effector.calls().is_empty());
        assert!(report.completed_steps.is_empty());
    }
}
