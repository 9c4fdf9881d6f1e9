use crate::planner::{PlannedStep, PlannerConfig};
use crate::state::{PlanningState, TIME};
use crate::{Action, GoapError, Goal, Result};
use log::debug;
use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

/// Trait defining the interface for search algorithms used by the planner.
///
/// An implementation finds an ordered sequence of actions that, applied from
/// `start`, reaches a state satisfying every goal at once.
///
/// # Examples
///
/// ```
/// use npc_goap::{Action, GoapError, Goal, PlannedStep, PlannerConfig, PlanningState, SearchAlgorithm};
///
/// /// Tries single actions only.
/// struct OneStepSearch;
///
/// impl SearchAlgorithm for OneStepSearch {
///     fn search(
///         &self,
///         actions: &[Action],
///         goals: &[Goal],
///         start: &PlanningState,
///         config: &PlannerConfig,
///     ) -> Result<Vec<PlannedStep>, GoapError> {
///         for action in actions {
///             if action.is_applicable(&start.agent, &start.world) {
///                 let (agent, world) = action.apply(&start.agent, &start.world);
///                 if goals.iter().all(|g| g.is_satisfied(&agent, &world)) {
///                     let cost = action.incremental_cost(config.time_weight);
///                     return Ok(vec![PlannedStep::new(action.clone(), cost)]);
///                 }
///             }
///         }
///         Err(GoapError::NoPlanFound)
///     }
/// }
/// ```
pub trait SearchAlgorithm: Send + Sync {
    /// Finds a sequence of actions that jointly satisfies `goals`.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<PlannedStep>)` - the plan; empty when the goals already hold
    /// * `Err(GoapError::NoPlanFound)` - the reachable state space holds no solution
    /// * `Err(GoapError::SearchBudgetExhausted)` - the expansion budget ran out
    fn search(
        &self,
        actions: &[Action],
        goals: &[Goal],
        start: &PlanningState,
        config: &PlannerConfig,
    ) -> Result<Vec<PlannedStep>>;
}

/// A trait for heuristic functions used in search algorithms.
pub trait HeuristicStrategy: Send + Sync {
    /// Estimates the remaining cost from `state` to a state satisfying `goals`.
    fn calculate(&self, state: &PlanningState, goals: &[Goal]) -> f64;
}

/// Sums the weights of the goals `state` does not satisfy yet.
pub struct WeightedGoalHeuristic;

impl HeuristicStrategy for WeightedGoalHeuristic {
    fn calculate(&self, state: &PlanningState, goals: &[Goal]) -> f64 {
        goals
            .iter()
            .filter(|g| !g.is_satisfied(&state.agent, &state.world))
            .map(|g| g.weight)
            .sum()
    }
}

/// Zero heuristic, turning best-first search into uniform-cost search.
pub struct ZeroHeuristic;

impl HeuristicStrategy for ZeroHeuristic {
    fn calculate(&self, _state: &PlanningState, _goals: &[Goal]) -> f64 {
        0.0
    }
}

/// Represents a node in the search space.
#[derive(Debug, Clone)]
struct Node {
    state: PlanningState,
    parent: Option<usize>,
    /// Index into the action slice of the action that led here
    action: Option<usize>,
    step_cost: f64,
    g_cost: f64,
    h_cost: f64,
    /// Superseded by a node with the same signature that is no worse
    pruned: bool,
}

impl Node {
    fn f_cost(&self) -> f64 {
        self.g_cost + self.h_cost
    }
}

/// Priority queue entry. Lower `f_cost` first; ties go to the node created first.
#[derive(Debug, Clone)]
struct NodeWrapper {
    idx: usize,
    f_cost: f64,
}

impl PartialEq for NodeWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NodeWrapper {}

impl PartialOrd for NodeWrapper {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeWrapper {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f_cost
            .total_cmp(&other.f_cost)
            .then_with(|| self.idx.cmp(&other.idx))
    }
}

/// Path cost and remaining consumable resources of one node.
#[derive(Debug, Clone)]
struct Label {
    node: usize,
    g_cost: f64,
    pools: BTreeMap<String, f64>,
}

impl Label {
    fn of(node: usize, g_cost: f64, state: &PlanningState) -> Self {
        let pools = state
            .agent
            .resources()
            .filter(|(key, _)| *key != TIME)
            .map(|(key, amount)| (key.to_string(), amount))
            .collect();
        Self { node, g_cost, pools }
    }

    /// Costs no more than `other` and keeps at least as much of every pool.
    fn dominates(&self, other: &Label) -> bool {
        self.g_cost <= other.g_cost
            && other
                .pools
                .iter()
                .all(|(key, theirs)| self.pools.get(key).map_or(false, |mine| mine >= theirs))
    }
}

/// Manages the state of a graph search.
struct SearchContext<'a> {
    nodes: Vec<Node>,
    open_set: BinaryHeap<Reverse<NodeWrapper>>,
    /// Non-dominated labels per dedup signature
    labels: HashMap<PlanningState, Vec<Label>>,
    goals: &'a [Goal],
    heuristic: &'a dyn HeuristicStrategy,
    config: &'a PlannerConfig,
    expanded: usize,
}

impl<'a> SearchContext<'a> {
    fn new(
        start: &PlanningState,
        goals: &'a [Goal],
        heuristic: &'a dyn HeuristicStrategy,
        config: &'a PlannerConfig,
    ) -> Self {
        let mut context = Self {
            nodes: Vec::new(),
            open_set: BinaryHeap::new(),
            labels: HashMap::new(),
            goals,
            heuristic,
            config,
            expanded: 0,
        };
        context.push(Node {
            state: start.clone(),
            parent: None,
            action: None,
            step_cost: 0.0,
            g_cost: 0.0,
            h_cost: heuristic.calculate(start, goals),
            pruned: false,
        });
        context
    }

    fn signature(&self, state: &PlanningState) -> PlanningState {
        state.signature(self.config.dedup_on_resources)
    }

    /// Whether a known node with the same signature is at least as good.
    fn is_dominated(&self, signature: &PlanningState, label: &Label) -> bool {
        self.labels
            .get(signature)
            .map_or(false, |known| known.iter().any(|k| k.dominates(label)))
    }

    fn push(&mut self, node: Node) {
        let idx = self.nodes.len();
        let signature = self.signature(&node.state);
        let label = Label::of(idx, node.g_cost, &node.state);

        let known = self.labels.entry(signature).or_default();
        let mut superseded = Vec::new();
        known.retain(|k| {
            let keep = !label.dominates(k);
            if !keep {
                superseded.push(k.node);
            }
            keep
        });
        known.push(label);
        for old in superseded {
            self.nodes[old].pruned = true;
        }

        self.open_set.push(Reverse(NodeWrapper {
            idx,
            f_cost: node.f_cost(),
        }));
        self.nodes.push(node);
    }

    /// Pops the next node worth expanding, skipping superseded entries.
    fn next_node(&mut self) -> Option<usize> {
        while let Some(Reverse(wrapper)) = self.open_set.pop() {
            if !self.nodes[wrapper.idx].pruned {
                return Some(wrapper.idx);
            }
        }
        None
    }

    fn is_goal(&self, node_idx: usize) -> bool {
        let state = &self.nodes[node_idx].state;
        self.goals
            .iter()
            .all(|g| g.is_satisfied(&state.agent, &state.world))
    }

    /// Applicable actions, hinted ones first, otherwise in catalog order.
    fn applicable_actions(&self, actions: &[Action], state: &PlanningState) -> Vec<usize> {
        let (mut hinted, plain): (Vec<usize>, Vec<usize>) = actions
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_applicable(&state.agent, &state.world))
            .map(|(i, _)| i)
            .partition(|&i| self.goals.iter().any(|g| g.is_hinted_by(&actions[i])));
        hinted.extend(plain);
        hinted
    }

    fn expand(&mut self, parent_idx: usize, actions: &[Action]) {
        self.expanded += 1;
        let parent_state = self.nodes[parent_idx].state.clone();
        let parent_g = self.nodes[parent_idx].g_cost;

        for action_idx in self.applicable_actions(actions, &parent_state) {
            let action = &actions[action_idx];
            let (agent, world) = action.apply(&parent_state.agent, &parent_state.world);
            let state = PlanningState::new(agent, world);
            let step_cost = action.incremental_cost(self.config.time_weight);
            let g_cost = parent_g + step_cost;

            let signature = self.signature(&state);
            if self.is_dominated(&signature, &Label::of(self.nodes.len(), g_cost, &state)) {
                continue;
            }

            let h_cost = self.heuristic.calculate(&state, self.goals);
            self.push(Node {
                state,
                parent: Some(parent_idx),
                action: Some(action_idx),
                step_cost,
                g_cost,
                h_cost,
                pruned: false,
            });
        }
    }

    /// Reconstructs the path from the initial state to the given node.
    fn reconstruct_path(&self, node_idx: usize, actions: &[Action]) -> Vec<PlannedStep> {
        let mut path = Vec::new();
        let mut current_idx = node_idx;

        while let Some(node) = self.nodes.get(current_idx) {
            if let Some(action_idx) = node.action {
                path.push(PlannedStep::new(actions[action_idx].clone(), node.step_cost));
            }

            if let Some(parent_idx) = node.parent {
                current_idx = parent_idx;
            } else {
                break;
            }
        }

        path.reverse();
        path
    }
}

/// Best-first forward search over `(agent, world)` states.
///
/// Nodes are ordered by accumulated cost plus the heuristic; equal priorities
/// go to the node generated first, which makes the result deterministic.
pub struct BestFirstSearch {
    heuristic: Box<dyn HeuristicStrategy>,
}

impl BestFirstSearch {
    pub fn new(heuristic: Box<dyn HeuristicStrategy>) -> Self {
        Self { heuristic }
    }

    /// Creates a search using [`WeightedGoalHeuristic`].
    pub fn with_default_heuristic() -> Self {
        Self {
            heuristic: Box::new(WeightedGoalHeuristic),
        }
    }
}

impl Default for BestFirstSearch {
    fn default() -> Self {
        Self::with_default_heuristic()
    }
}

impl SearchAlgorithm for BestFirstSearch {
    fn search(
        &self,
        actions: &[Action],
        goals: &[Goal],
        start: &PlanningState,
        config: &PlannerConfig,
    ) -> Result<Vec<PlannedStep>> {
        let mut context = SearchContext::new(start, goals, self.heuristic.as_ref(), config);

        while let Some(current_idx) = context.next_node() {
            if context.is_goal(current_idx) {
                debug!(
                    "Search succeeded after expanding {} of {} generated nodes",
                    context.expanded,
                    context.nodes.len()
                );
                return Ok(context.reconstruct_path(current_idx, actions));
            }

            if context.expanded >= config.max_expansions {
                debug!("Search budget of {} expansions reached", config.max_expansions);
                return Err(GoapError::SearchBudgetExhausted {
                    expanded: context.expanded,
                });
            }

            context.expand(current_idx, actions);
        }

        debug!(
            "Search space exhausted after expanding {} nodes",
            context.expanded
        );
        Err(GoapError::NoPlanFound)
    }
}

/// Uniform-cost search: best-first with a zero heuristic.
#[derive(Default)]
pub struct UniformCostSearch;

impl SearchAlgorithm for UniformCostSearch {
    fn search(
        &self,
        actions: &[Action],
        goals: &[Goal],
        start: &PlanningState,
        config: &PlannerConfig,
    ) -> Result<Vec<PlannedStep>> {
        BestFirstSearch::new(Box::new(ZeroHeuristic)).search(actions, goals, start, config)
    }
}
