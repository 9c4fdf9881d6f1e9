use thiserror::Error;

/// Errors produced while compiling goals, planning, or executing plans.
///
/// Planning-time failures are always recoverable: they degrade to "no goal"
/// or "no plan" and never leave the live agent or world state modified.
#[derive(Error, Debug)]
pub enum GoapError {
    // Goal compilation
    /// The sentence matched none of the known goal patterns
    #[error("Unparsable goal sentence: {0}")]
    UnparsableSentence(String),
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Unknown item: {0}")]
    UnknownItem(String),
    /// The item exists but has no "use" behavior
    #[error("Item has no usable behavior: {0}")]
    ItemNotUsable(String),
    #[error("Unknown place: {0}")]
    UnknownPlace(String),
    #[error("Unknown gesture: {0}")]
    UnknownGesture(String),
    /// Neither the agent, a place nor an item
    #[error("Unknown object: {0}")]
    UnknownObject(String),

    // Planning
    /// The frontier was exhausted without reaching a state satisfying every goal
    #[error("No valid plan found to achieve the goals")]
    NoPlanFound,
    #[error("Search budget exhausted after expanding {expanded} nodes")]
    SearchBudgetExhausted { expanded: usize },
    /// A replayed plan step found its preconditions or resources unmet
    #[error("Plan step {step} ('{action}') is not applicable")]
    StepNotApplicable { step: usize, action: String },

    // Execution and requests
    #[error("Effector failed during '{action}': {reason}")]
    Effector { action: String, reason: String },
    #[error("A plan is already executing")]
    PlanInFlight,
    #[error("No valid goals in planning request")]
    NoGoals,

    // Construction
    #[error("Action cost must be non-negative: {0}")]
    InvalidActionCost(String),
    #[error("Action already in catalog: {0}")]
    DuplicateAction(String),
    #[error("Invalid goal pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GoapError {
    /// Whether this error came out of goal compilation.
    pub fn is_compilation(&self) -> bool {
        matches!(
            self,
            GoapError::UnparsableSentence(_)
                | GoapError::UnknownAction(_)
                | GoapError::UnknownItem(_)
                | GoapError::ItemNotUsable(_)
                | GoapError::UnknownPlace(_)
                | GoapError::UnknownGesture(_)
                | GoapError::UnknownObject(_)
        )
    }

    /// Whether this error is a planning failure (no plan within limits).
    pub fn is_planning_failure(&self) -> bool {
        matches!(
            self,
            GoapError::NoPlanFound | GoapError::SearchBudgetExhausted { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GoapError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_no_plan_found_display() {
        let err = GoapError::NoPlanFound;
        assert_eq!(format!("{}", err), "No valid plan found to achieve the goals");
    }

    #[test]
    fn test_budget_display() {
        let err = GoapError::SearchBudgetExhausted { expanded: 42 };
        assert_eq!(
            format!("{}", err),
            "Search budget exhausted after expanding 42 nodes"
        );
    }

    #[test]
    fn test_effector_display() {
        let err = GoapError::Effector {
            action: "move_picture_to_sofa".to_string(),
            reason: "blocked".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Effector failed during 'move_picture_to_sofa': blocked"
        );
    }

    #[test]
    fn test_classification() {
        assert!(GoapError::UnknownAction("x".into()).is_compilation());
        assert!(GoapError::ItemNotUsable("pillow".into()).is_compilation());
        assert!(!GoapError::NoPlanFound.is_compilation());
        assert!(GoapError::NoPlanFound.is_planning_failure());
        assert!(GoapError::SearchBudgetExhausted { expanded: 1 }.is_planning_failure());
        assert!(!GoapError::PlanInFlight.is_planning_failure());
    }

    #[test]
    fn test_error_trait() {
        let err = GoapError::NoPlanFound;
        assert!(err.source().is_none());
    }
}
