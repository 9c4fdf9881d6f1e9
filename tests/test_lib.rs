use npc_goap::condition::flag_is;
use npc_goap::{
    Action, ActionCatalog, AgentState, Effect, GoalCompiler, GoalCondition, GoapError, Goal,
    GoapVisualizer, Planner, PlanningState, StatusSnapshot, WorldConfig, WorldSnapshot,
    WorldState,
};

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        agent: AgentState,
        world: WorldState,
        catalog: ActionCatalog,
        compiler: GoalCompiler,
    }

    impl Fixture {
        fn new() -> Self {
            Self::from_config(WorldConfig::default())
        }

        fn from_config(config: WorldConfig) -> Self {
            let (agent, world) = config.initial_state();
            let catalog = config.build_catalog(&agent, &world).unwrap();
            Self {
                agent,
                world,
                catalog,
                compiler: GoalCompiler::new().unwrap(),
            }
        }

        fn goals(&self, sentences: &[&str]) -> Vec<Goal> {
            sentences
                .iter()
                .map(|s| self.compiler.compile(s, &self.catalog, &self.world, 1.0).unwrap())
                .collect()
        }

        fn planner(&self) -> Planner {
            Planner::new(self.catalog.clone())
        }
    }

    #[test]
    fn test_go_to_sofa() {
        let fx = Fixture::new();
        let goals = fx.goals(&["Go to sofa"]);
        let plan = fx.planner().plan(&goals, &fx.agent, &fx.world).unwrap();
        assert_eq!(plan.names(), vec!["move_picture_to_sofa"]);

        let end = plan.simulate(&fx.agent, &fx.world).unwrap();
        assert_eq!(end.agent.location(), Some("sofa"));
    }

    #[test]
    fn test_pick_up_in_place() {
        let fx = Fixture::new();
        let agent = fx.agent.clone().with_lower_slot("location", "meja");
        let goals = fx.goals(&["Pick up snack"]);
        let plan = fx.planner().plan(&goals, &agent, &fx.world).unwrap();
        assert_eq!(plan.names(), vec!["pick_snack"]);

        let end = plan.simulate(&agent, &fx.world).unwrap();
        assert!(end.agent.carries("snack"));
        assert_eq!(end.agent.inventory().len(), 1);
        assert!(!end.world.place("meja").unwrap().contains("snack"));
        assert!(end.world.holds_containment_invariant(&end.agent));
    }

    #[test]
    fn test_pick_up_after_moving() {
        let fx = Fixture::new();
        let goals = fx.goals(&["Pick up snack"]);
        let plan = fx.planner().plan(&goals, &fx.agent, &fx.world).unwrap();
        assert_eq!(plan.names(), vec!["move_picture_to_meja", "pick_snack"]);
        assert_eq!(plan.total_cost(), 3.0 + 2.5);
    }

    #[test]
    fn test_use_snack_acquires_it_first() {
        let fx = Fixture::new();
        let goals = fx.goals(&["Use snack"]);
        let plan = fx.planner().plan(&goals, &fx.agent, &fx.world).unwrap();
        assert_eq!(
            plan.names(),
            vec!["move_picture_to_meja", "pick_snack", "use_snack"]
        );
        let end = plan.simulate(&fx.agent, &fx.world).unwrap();
        assert!(end.agent.flag_is_true("used_snack"));
        assert!(end.agent.carries("snack"));
    }

    #[test]
    fn test_use_missing_item_fails() {
        let mut config = WorldConfig::default();
        for place in &mut config.places {
            place.items.retain(|i| i != "snack");
        }
        config.planner.max_expansions = 2_000;
        let fx = Fixture::from_config(config.clone());
        let goals = fx.goals(&["Use snack"]);
        let planner = Planner::with_config(fx.catalog.clone(), config.planner);

        let result = planner.plan(&goals, &fx.agent, &fx.world);
        assert!(result.unwrap_err().is_planning_failure());
    }

    #[test]
    fn test_turn_tv_on() {
        let fx = Fixture::new();
        let goals = fx.goals(&["Do set_tv_state_on in tv"]);
        assert!(!goals[0].is_satisfied(&fx.agent, &fx.world));

        let plan = fx.planner().plan(&goals, &fx.agent, &fx.world).unwrap();
        assert_eq!(plan.names(), vec!["move_picture_to_tv", "set_tv_state_on"]);

        let end = plan.simulate(&fx.agent, &fx.world).unwrap();
        assert_eq!(end.agent.location(), Some("tv"));
        let flag = end.world.place("tv").unwrap().flag("tv_state").unwrap();
        assert!(flag.matches_text("on"));
    }

    #[test]
    fn test_joint_goals() {
        let fx = Fixture::new();
        let goals = fx.goals(&["Go to sofa", "Do Thinking"]);
        let plan = fx.planner().plan(&goals, &fx.agent, &fx.world).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.names().contains(&"thinking"));

        let end = plan.simulate(&fx.agent, &fx.world).unwrap();
        assert!(goals.iter().all(|g| g.is_satisfied(&end.agent, &end.world)));
        assert_eq!(end.agent.location(), Some("sofa"));
        assert!(end.agent.flag_is_true("did_thinking"));
    }

    #[test]
    fn test_planning_is_deterministic() {
        let fx = Fixture::new();
        let goals = fx.goals(&["Use snack", "Do Clapping", "Go to tv"]);
        let planner = fx.planner();
        let first = planner.plan(&goals, &fx.agent, &fx.world).unwrap();
        for _ in 0..5 {
            let again = planner.plan(&goals, &fx.agent, &fx.world).unwrap();
            assert_eq!(again.names(), first.names());
        }
    }

    #[test]
    fn test_plans_stay_applicable_and_non_negative() {
        let fx = Fixture::new();
        let scenarios: &[&[&str]] = &[
            &["Go to piano"],
            &["Use lance"],
            &["Drop pillow at tv"],
            &["Change pose of npc to sit"],
            &["Do set_tv_state_off in tv", "Do Bashful"],
        ];
        for sentences in scenarios {
            let goals = fx.goals(sentences);
            let plan = fx.planner().plan(&goals, &fx.agent, &fx.world).unwrap();

            let mut agent = fx.agent.clone();
            let mut world = fx.world.clone();
            for step in &plan {
                assert!(
                    step.action.is_applicable(&agent, &world),
                    "{} not applicable in {:?}",
                    step.action.name,
                    sentences
                );
                step.action.apply_in_place(&mut agent, &mut world);
                for (resource, amount) in agent.resources() {
                    if resource != "time" {
                        assert!(amount >= 0.0, "{} below zero", resource);
                    }
                }
                assert!(world.holds_containment_invariant(&agent));
            }
            assert!(goals.iter().all(|g| g.is_satisfied(&agent, &world)));
        }
    }

    #[test]
    fn test_exhausted_resource_blocks_plan() {
        let fx = Fixture::new();
        let tired = fx.agent.clone().with_resource("health", 1.0);
        let goals = fx.goals(&["Go to sofa"]);
        let result = fx.planner().plan(&goals, &tired, &fx.world);
        assert!(matches!(result, Err(GoapError::NoPlanFound)));
    }

    #[test]
    fn test_costlier_path_that_saves_health_is_kept() {
        let agent = AgentState::new()
            .with_resource("health", 10.0)
            .with_resource("time", 0.0);
        let catalog = ActionCatalog::new()
            .with_action(
                Action::new("sprint_to_door")
                    .with_effect(Effect::classify("at_door", true, &agent))
                    .with_cost("time", 1.0)
                    .unwrap()
                    .with_cost("health", 3.0)
                    .unwrap(),
            )
            .unwrap()
            .with_action(
                Action::new("walk_to_door")
                    .with_effect(Effect::classify("at_door", true, &agent))
                    .with_cost("time", 5.0)
                    .unwrap(),
            )
            .unwrap()
            .with_action(
                Action::new("force_door")
                    .with_precondition("at_door", flag_is("at_door", true))
                    .with_effect(Effect::classify("door_open", true, &agent))
                    .with_cost("health", 8.0)
                    .unwrap(),
            )
            .unwrap();
        let goals = vec![Goal::new(
            "open the door",
            GoalCondition::FlagTrue { key: "door_open".into() },
        )];

        // Both first steps reach the same flags; only walking leaves enough health
        let plan = Planner::new(catalog)
            .plan(&goals, &agent, &WorldState::new())
            .unwrap();
        assert_eq!(plan.names(), vec!["walk_to_door", "force_door"]);

        let end = plan.simulate(&agent, &WorldState::new()).unwrap();
        assert_eq!(end.agent.resource("health"), Some(2.0));
        assert!(end.agent.flag_is_true("door_open"));
    }

    #[test]
    fn test_planning_leaves_inputs_untouched() {
        let fx = Fixture::new();
        let before = PlanningState::new(fx.agent.clone(), fx.world.clone());
        let goals = fx.goals(&["Use snack"]);
        fx.planner().plan(&goals, &fx.agent, &fx.world).unwrap();
        assert_eq!(PlanningState::new(fx.agent.clone(), fx.world.clone()), before);
    }

    #[test]
    fn test_copy_is_independent() {
        let fx = Fixture::new();
        let mut agent = fx.agent.clone();
        let mut world = fx.world.clone();
        agent.add_item("snack");
        agent.set_slot("location", "tv");
        world.place_mut("meja").unwrap().remove_item("snack");
        world.place_mut("tv").unwrap().set_flag("tv_state", "on");

        assert!(!fx.agent.carries("snack"));
        assert_eq!(fx.agent.location(), Some("picture"));
        assert!(fx.world.place("meja").unwrap().contains("snack"));
        assert!(fx.world.place("tv").unwrap().flag("tv_state").unwrap().matches_text("off"));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let fx = Fixture::new();
        let goals = fx.goals(&["Pick up lance"]);
        let plan = fx.planner().plan(&goals, &fx.agent, &fx.world).unwrap();
        let end = plan.simulate(&fx.agent, &fx.world).unwrap();

        let status = StatusSnapshot::from_state(&end.agent);
        let parsed: StatusSnapshot = serde_json::from_str(&status.to_json().unwrap()).unwrap();
        assert_eq!(parsed.inventory, "lance");
        assert_eq!(parsed.holding, "lance");

        let world = WorldSnapshot::from_state(&end.world);
        let parsed: WorldSnapshot = serde_json::from_str(&world.to_json().unwrap()).unwrap();
        for place in end.world.places() {
            let snapshot = &parsed.places[place.name()];
            let mut expected: Vec<String> = place.inventory().iter().cloned().collect();
            let mut actual = snapshot.inventory.clone();
            expected.sort();
            actual.sort();
            assert_eq!(actual, expected);
            assert_eq!(snapshot.flags.len(), place.flags().count());
        }
        assert_eq!(parsed.items.len(), 3);
    }

    #[test]
    fn test_unparsable_goal() {
        let fx = Fixture::new();
        for sentence in ["", "none", "Dance wildly"] {
            let result = fx.compiler.compile(sentence, &fx.catalog, &fx.world, 1.0);
            assert!(matches!(result, Err(GoapError::UnparsableSentence(_))));
        }
    }

    #[test]
    fn test_visualizer_output() {
        let fx = Fixture::new();
        let goals = fx.goals(&["Go to sofa"]);
        let plan = fx.planner().plan(&goals, &fx.agent, &fx.world).unwrap();
        let start = PlanningState::new(fx.agent.clone(), fx.world.clone());
        let dot = GoapVisualizer::new().render_plan(&fx.catalog, &goals, &start, &plan);
        assert!(dot.contains("move_picture_to_sofa"));
        assert!(dot.trim_end().ends_with('}'));
    }
}
