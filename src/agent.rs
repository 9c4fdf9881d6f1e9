//! # NPC Agent
//!
//! [`NpcAgent`] is the facade the game layer talks to. It owns the live
//! agent and world state, the action catalog (inside its [`Planner`]), the
//! goal compiler and a [`PlanExecutor`], and enforces that at most one plan
//! executes at a time.
//!
//! A request cycle is: build a [`PlanningRequest`], [`plan`](NpcAgent::plan)
//! it, then [`execute`](NpcAgent::execute) the resulting plan through an
//! [`Effector`]. [`act`](NpcAgent::act) does both.
//!
//! ```
//! use npc_goap::{NoopEffector, NpcAgent, PlanningRequest, WorldConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> npc_goap::Result<()> {
//! let agent = NpcAgent::new(&WorldConfig::default())?;
//! let request = PlanningRequest::new()
//!     .with_movement("sofa")
//!     .with_gesture("Thinking");
//!
//! let report = agent.act(&request, &NoopEffector).await?;
//! assert!(report.is_complete());
//! assert_eq!(agent.status().await.location, "sofa");
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::catalog::ActionCatalog;
use crate::compiler::GoalCompiler;
use crate::config::WorldConfig;
use crate::executor::{Effector, ExecutionReport, ExecutionState, PlanExecutor};
use crate::goal::Goal;
use crate::planner::{ActionSequence, Planner};
use crate::snapshot::{StatusSnapshot, WorldSnapshot};
use crate::state::{normalize, PlanningState, WorldState};
use crate::{GoapError, Result};

/// What the game layer asks the agent to do. Every entry is optional;
/// `"none"` and blank entries count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningRequest {
    /// A gesture name, e.g. "Thinking"
    pub gesture: Option<String>,
    /// A place to go to
    pub movement: Option<String>,
    /// A free-form goal sentence, e.g. "Use snack"
    pub item: Option<String>,
    /// An action name, e.g. "sit_sofa"
    pub action: Option<String>,
}

fn present(entry: &Option<String>) -> Option<&str> {
    entry
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
}

impl PlanningRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gesture(mut self, gesture: &str) -> Self {
        self.gesture = Some(gesture.to_string());
        self
    }

    pub fn with_movement(mut self, place: &str) -> Self {
        self.movement = Some(place.to_string());
        self
    }

    pub fn with_item(mut self, sentence: &str) -> Self {
        self.item = Some(sentence.to_string());
        self
    }

    pub fn with_action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        [&self.gesture, &self.movement, &self.item, &self.action]
            .iter()
            .all(|entry| present(entry).is_none())
    }

    /// Turns each present entry into a goal sentence, in the order gesture,
    /// movement, item, action.
    ///
    /// Gestures must be known to the catalog (`UnknownGesture`) and
    /// movement targets must be places (`UnknownPlace`).
    pub fn sentences(&self, catalog: &ActionCatalog, world: &WorldState) -> Vec<Result<String>> {
        let mut sentences = Vec::new();
        if let Some(gesture) = present(&self.gesture) {
            sentences.push(if catalog.is_gesture(gesture) {
                Ok(format!("Do {}", gesture))
            } else {
                Err(GoapError::UnknownGesture(gesture.to_string()))
            });
        }
        if let Some(place) = present(&self.movement) {
            sentences.push(if world.has_place(place) {
                Ok(format!("Go to {}", place))
            } else {
                Err(GoapError::UnknownPlace(place.to_string()))
            });
        }
        if let Some(sentence) = present(&self.item) {
            sentences.push(Ok(sentence.to_string()));
        }
        if let Some(action) = present(&self.action) {
            sentences.push(Ok(format!("Do {}", action)));
        }
        sentences
    }
}

/// Clears the executing flag when dropped.
struct ExecutingGuard<'a>(&'a AtomicBool);

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A planning NPC: live state, planner, compiler and executor.
pub struct NpcAgent {
    state: RwLock<PlanningState>,
    planner: Planner,
    compiler: GoalCompiler,
    executor: PlanExecutor,
    executing: AtomicBool,
}

impl NpcAgent {
    /// Builds the agent, its world and its catalog from a configuration.
    pub fn new(config: &WorldConfig) -> Result<Self> {
        let (agent, world) = config.initial_state();
        let catalog = config.build_catalog(&agent, &world)?;
        info!(
            "NPC agent ready: {} places, {} actions",
            world.places().count(),
            catalog.len()
        );
        Ok(Self {
            state: RwLock::new(PlanningState::new(agent, world)),
            planner: Planner::with_config(catalog, config.planner.clone()),
            compiler: GoalCompiler::new()?,
            executor: PlanExecutor::new(),
            executing: AtomicBool::new(false),
        })
    }

    /// Replaces the default planner, e.g. to plug in another search algorithm.
    pub fn with_planner(mut self, planner: Planner) -> Self {
        self.planner = planner;
        self
    }

    pub fn catalog(&self) -> &ActionCatalog {
        self.planner.catalog()
    }

    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    pub async fn execution_state(&self) -> ExecutionState {
        self.executor.state().await
    }

    /// Compiles a request into goals against the current world.
    ///
    /// Entries that fail to compile are logged and skipped.
    pub async fn compile_request(&self, request: &PlanningRequest) -> Vec<Goal> {
        let world = self.state.read().await.world.clone();
        self.compile_against(request, &world)
    }

    fn compile_against(&self, request: &PlanningRequest, world: &WorldState) -> Vec<Goal> {
        let catalog = self.catalog();
        request
            .sentences(catalog, world)
            .into_iter()
            .filter_map(|sentence| {
                sentence
                    .and_then(|s| self.compiler.compile(&s, catalog, world, 1.0))
                    .map_err(|e| warn!("Skipping request entry: {}", e))
                    .ok()
            })
            .collect()
    }

    /// Plans for a request from the current live state.
    ///
    /// Gesture completion flags are reset first so gestures can repeat.
    ///
    /// # Errors
    ///
    /// * `PlanInFlight` while a plan is executing
    /// * `NoGoals` when no entry of the request compiles
    /// * any planning failure from [`Planner::plan`]
    pub async fn plan(&self, request: &PlanningRequest) -> Result<ActionSequence> {
        // Reset and snapshot under the write lock; execute() starts under it too
        let snapshot = {
            let mut state = self.state.write().await;
            if self.is_executing() {
                warn!("Planning request rejected: a plan is executing");
                return Err(GoapError::PlanInFlight);
            }
            self.reset_gesture_flags(&mut state);
            state.clone()
        };

        let goals = self.compile_against(request, &snapshot.world);
        if goals.is_empty() {
            warn!("Planning request produced no goals");
            return Err(GoapError::NoGoals);
        }
        self.planner.plan(&goals, &snapshot.agent, &snapshot.world)
    }

    /// Plans for already-compiled goals from the current live state.
    pub async fn plan_goals(&self, goals: &[Goal]) -> Result<ActionSequence> {
        let PlanningState { agent, world } = {
            let state = self.state.read().await;
            if self.is_executing() {
                return Err(GoapError::PlanInFlight);
            }
            state.clone()
        };
        self.planner.plan(goals, &agent, &world)
    }

    /// Sets every existing `did_<gesture>` flag back to false. Gestures that
    /// never ran have no flag and keep none.
    fn reset_gesture_flags(&self, state: &mut PlanningState) {
        for gesture in self.planner.catalog().gestures() {
            let key = format!("did_{}", normalize(gesture));
            if state.agent.flag(&key).is_some() {
                state.agent.set_flag(&key, false);
            }
        }
    }

    /// Executes a plan against the live state.
    ///
    /// Effector failures and cancellation are reported through the returned
    /// [`ExecutionReport`]; only a concurrent execution is an error
    /// (`PlanInFlight`).
    pub async fn execute(&self, plan: &ActionSequence, effector: &dyn Effector) -> Result<ExecutionReport> {
        {
            let _state = self.state.write().await;
            if self
                .executing
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return Err(GoapError::PlanInFlight);
            }
        }
        let _guard = ExecutingGuard(&self.executing);
        debug!("Executing {} steps", plan.len());
        Ok(self
            .executor
            .execute(plan, self.planner.catalog(), effector, &self.state)
            .await)
    }

    /// Plans for a request and executes the result.
    pub async fn act(&self, request: &PlanningRequest, effector: &dyn Effector) -> Result<ExecutionReport> {
        let plan = self.plan(request).await?;
        self.execute(&plan, effector).await
    }

    /// Requests cancellation of the executing plan; takes effect between steps.
    pub fn cancel(&self) {
        if self.is_executing() {
            info!("Cancellation requested");
        }
        self.executor.cancel_handle().cancel();
    }

    pub async fn status(&self) -> StatusSnapshot {
        StatusSnapshot::from_state(&self.state.read().await.agent)
    }

    pub async fn world_snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::from_state(&self.state.read().await.world)
    }

    /// A copy of the live agent and world state.
    pub async fn state(&self) -> PlanningState {
        self.state.read().await.clone()
    }
}
