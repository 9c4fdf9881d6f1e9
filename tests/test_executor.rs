use std::sync::Mutex;

use async_trait::async_trait;
use npc_goap::{
    Action, Effector, EffectorResult, ExecutionOutcome, GoapError, NpcAgent, PlanningRequest,
    Value, WorldConfig,
};

/// Logs calls and refuses to touch a configured item.
#[derive(Default)]
struct ScriptedEffector {
    log: Mutex<Vec<String>>,
    refuse: Option<&'static str>,
}

impl ScriptedEffector {
    fn refusing(item: &'static str) -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            refuse: Some(item),
        }
    }

    fn push(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Effector for ScriptedEffector {
    async fn begin_move(&self, target: &str) -> EffectorResult {
        self.push(format!("walk {}", target));
        Ok(())
    }

    async fn perform_gesture(&self, gesture: &str) -> EffectorResult {
        self.push(format!("gesture {}", gesture));
        Ok(())
    }

    async fn pick_up(&self, item: &str) -> EffectorResult {
        if self.refuse == Some(item) {
            return Err(format!("{} is out of reach", item));
        }
        self.push(format!("pick {}", item));
        Ok(())
    }

    async fn drop_item(&self, item: &str) -> EffectorResult {
        self.push(format!("drop {}", item));
        Ok(())
    }

    async fn use_item(&self, item: &str) -> EffectorResult {
        self.push(format!("use {}", item));
        Ok(())
    }

    async fn set_place_flag(&self, place: &str, key: &str, value: &Value) -> EffectorResult {
        self.push(format!("set {}.{}={}", place, key, value));
        Ok(())
    }

    async fn perform(&self, action: &Action) -> EffectorResult {
        self.push(format!("perform {}", action.name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> NpcAgent {
        NpcAgent::new(&WorldConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_full_request_cycle() {
        let agent = agent();
        let effector = ScriptedEffector::default();
        let request = PlanningRequest::new().with_item("Do set_tv_state_on in tv");

        let report = agent.act(&request, &effector).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(effector.log(), vec!["walk tv", "set tv.tv_state=on"]);
        let world = agent.world_snapshot().await;
        assert_eq!(world.places["tv"].flags["tv_state"], Value::from("on"));
    }

    #[tokio::test]
    async fn test_sit_on_sofa_is_generic() {
        let agent = agent();
        let effector = ScriptedEffector::default();
        let request = PlanningRequest::new().with_action("sit_sofa");

        agent.act(&request, &effector).await.unwrap();

        assert_eq!(effector.log(), vec!["walk sofa", "perform sit_sofa"]);
        assert_eq!(agent.status().await.pose, "sit");
    }

    #[tokio::test]
    async fn test_effector_failure_aborts_remaining_steps() {
        let agent = agent();
        let effector = ScriptedEffector::refusing("snack");
        let request = PlanningRequest::new().with_item("Use snack");

        let report = agent.act(&request, &effector).await.unwrap();

        match &report.outcome {
            ExecutionOutcome::Aborted { step, action, reason } => {
                assert_eq!(*step, 1);
                assert_eq!(action, "pick_snack");
                assert_eq!(reason, "snack is out of reach");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(matches!(report.error(), Some(GoapError::Effector { .. })));
        assert_eq!(effector.log(), vec!["walk meja"]);

        // The move stands, nothing after it was committed
        let status = agent.status().await;
        assert_eq!(status.location, "meja");
        assert_eq!(status.inventory, "none");
        assert!(!agent.state().await.agent.flag_is_true("used_snack"));
        assert!(!agent.is_executing());
    }

    #[tokio::test]
    async fn test_replanning_from_committed_state() {
        let agent = agent();
        let effector = ScriptedEffector::default();

        agent
            .act(&PlanningRequest::new().with_movement("meja"), &effector)
            .await
            .unwrap();
        let plan = agent
            .plan(&PlanningRequest::new().with_item("Use lance"))
            .await
            .unwrap();

        assert_eq!(plan.names(), vec!["pick_lance", "use_lance"]);
    }

    #[tokio::test]
    async fn test_empty_plan_completes_immediately() {
        let agent = agent();
        let effector = ScriptedEffector::default();
        // Already at the picture
        let report = agent
            .act(&PlanningRequest::new().with_movement("picture"), &effector)
            .await
            .unwrap();

        assert!(report.is_complete());
        assert!(report.completed_steps.is_empty());
        assert!(effector.log().is_empty());
    }
}
