use crate::catalog::ActionCatalog;
use crate::planner::ActionSequence;
use crate::state::PlanningState;
use crate::{Goal, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A visualizer for GOAP plans that generates Graphviz DOT files
#[derive(Debug, Default, Clone, Copy)]
pub struct GoapVisualizer;

impl GoapVisualizer {
    /// Create a new GOAP visualizer
    pub fn new() -> Self {
        Self
    }

    /// Render a plan as a DOT graph: the start state, every plan step with
    /// its cost and effects, the goals, and the other actions that were
    /// applicable at the start.
    pub fn render_plan(
        &self,
        catalog: &ActionCatalog,
        goals: &[Goal],
        start: &PlanningState,
        plan: &ActionSequence,
    ) -> String {
        let mut lines = vec![
            "digraph GOAP {".to_string(),
            "    rankdir=LR;".to_string(),
            "    node [shape=box, style=filled, fillcolor=lightblue];".to_string(),
            "    edge [fontsize=10];".to_string(),
        ];

        lines.push(format!(
            "    initial [label=\"Initial State\\n{}\", fillcolor=lightgreen];",
            Self::state_to_string(start)
        ));

        let goal_names: Vec<String> = goals.iter().map(|g| escape(&g.to_string())).collect();
        lines.push(format!(
            "    goal [label=\"Goals\\n{}\", fillcolor=lightpink];",
            goal_names.join("\\n")
        ));

        // Alternatives open at the start, dimmed
        let planned: Vec<&str> = plan.names();
        for (i, action) in catalog.iter().enumerate() {
            if planned.contains(&action.name.as_str()) {
                continue;
            }
            if action.is_applicable(&start.agent, &start.world) {
                lines.push(format!(
                    "    alt_{} [label=\"{}\", fillcolor=lightgray];",
                    i,
                    escape(&action.name)
                ));
                lines.push(format!("    initial -> alt_{} [label=\"possible\", style=dashed];", i));
            }
        }

        // The chosen plan path
        for (i, step) in plan.iter().enumerate() {
            let effects: Vec<String> = step.action.effects.iter().map(|e| escape(&e.to_string())).collect();
            lines.push(format!(
                "    step_{} [label=\"{}\\nCost: {}\\nEff: {}\", fillcolor=lightcoral];",
                i,
                escape(&step.action.name),
                step.cost,
                effects.join("\\n")
            ));
        }
        lines.push("    edge [color=red, penwidth=2.0];".to_string());
        let mut previous = "initial".to_string();
        for i in 0..plan.len() {
            lines.push(format!("    {} -> step_{};", previous, i));
            previous = format!("step_{}", i);
        }
        lines.push(format!(
            "    {} -> goal [label=\"total {}\"];",
            previous,
            plan.total_cost()
        ));

        lines.push("}".to_string());
        lines.join("\n") + "\n"
    }

    /// Write the DOT rendering of a plan to `path`
    pub fn write_plan(
        &self,
        catalog: &ActionCatalog,
        goals: &[Goal],
        start: &PlanningState,
        plan: &ActionSequence,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(self.render_plan(catalog, goals, start, plan).as_bytes())?;
        Ok(())
    }

    /// Helper method to summarize the agent side of a state
    fn state_to_string(state: &PlanningState) -> String {
        let agent = &state.agent;
        let mut parts: Vec<String> = agent
            .lower_body()
            .chain(agent.upper_body())
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect();
        if !agent.inventory().is_empty() {
            let items: Vec<&str> = agent.inventory().iter().map(String::as_str).collect();
            parts.push(format!("inventory: {}", items.join(", ")));
        }
        parts.extend(agent.resources().map(|(key, amount)| format!("{}: {}", key, amount)));
        escape(&parts.join("\n")).replace('\n', "\\n")
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
