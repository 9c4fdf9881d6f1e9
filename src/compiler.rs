//! # Goal Compiler
//!
//! Turns semi-structured sentences into [`Goal`]s. A sentence is normalized
//! (trimmed, trailing periods and the articles "the", "a", "an" removed) and
//! matched against a fixed, ordered list of patterns. The first match wins, so
//! more specific forms come before their prefixes ("Use X at Y" before "Use X").
//!
//! | Sentence                           | Satisfied when                                  |
//! |------------------------------------|-------------------------------------------------|
//! | `Use <item> at/in/on <place>`      | flag `used_<item>` is true                      |
//! | `Use <item>`                       | flag `used_<item>` is true                      |
//! | `Do <action> in/on <place>`        | at `<place>` and the action's effects hold      |
//! | `Change <flag> of <obj> to <val>`  | the object's flag equals `<val>`                |
//! | `Go to <place>`                    | the agent is at `<place>`                       |
//! | `Pick up <item> [at <place>]`      | the agent carries `<item>`                      |
//! | `Drop <item> at <place>`           | at `<place>`, not carried, and lying there      |
//! | `Do <action>`                      | the action's effects hold (or `did_<action>`)   |
//!
//! ## Example
//!
//! ```
//! use npc_goap::{GoalCompiler, WorldConfig};
//!
//! let config = WorldConfig::default();
//! let (agent, world) = config.initial_state();
//! let catalog = config.build_catalog(&agent, &world).unwrap();
//! let compiler = GoalCompiler::new().unwrap();
//!
//! let goal = compiler.compile("Go to the Sofa.", &catalog, &world, 1.0).unwrap();
//! assert_eq!(goal.name, "Go_to_sofa");
//! assert!(compiler.compile("Dance wildly", &catalog, &world, 1.0).is_err());
//! ```

use log::{debug, warn};
use regex::{Captures, Regex};

use crate::catalog::ActionCatalog;
use crate::effect::Effect;
use crate::goal::{Goal, GoalCondition, StateOwner};
use crate::state::{normalize, AgentState, WorldState};
use crate::{GoapError, Result};

/// Names the agent answers to in `Change ... of <object> to ...`.
const AGENT_ALIASES: [&str; 3] = ["npc", "agent", "self"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SentencePattern {
    UseAt,
    Use,
    DoAt,
    Change,
    GoTo,
    PickUpAt,
    PickUp,
    DropAt,
    Do,
}

/// Rule-based sentence to goal compiler. Patterns are compiled once.
#[derive(Debug, Clone)]
pub struct GoalCompiler {
    articles: Regex,
    patterns: Vec<(SentencePattern, Regex)>,
}

impl GoalCompiler {
    pub fn new() -> Result<Self> {
        let table = [
            (SentencePattern::UseAt, r"(?i)\buse\s+(.+?)\s+(?:in|on|at)\s+(.+)$"),
            (SentencePattern::Use, r"(?i)\buse\s+(.+)$"),
            (SentencePattern::DoAt, r"(?i)\bdo\s+(.+?)\s+(?:in|on)\s+(.+)$"),
            (SentencePattern::Change, r"(?i)\bchange\s+(.+?)\s+of\s+(.+?)\s+to\s+(.+)$"),
            (SentencePattern::GoTo, r"(?i)\bgo\s+to\s+(.+)$"),
            (SentencePattern::PickUpAt, r"(?i)\bpick\s+up\s+(.+?)\s+at\s+(.+)$"),
            (SentencePattern::PickUp, r"(?i)\bpick\s+up\s+(.+)$"),
            (SentencePattern::DropAt, r"(?i)\bdrop\s+(.+?)\s+at\s+(.+)$"),
            (SentencePattern::Do, r"(?i)\bdo\s+(.+)$"),
        ];
        let patterns = table
            .iter()
            .map(|(pattern, source)| Ok((*pattern, Regex::new(source)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            articles: Regex::new(r"(?i)\b(?:the|a|an)\b\s*")?,
            patterns,
        })
    }

    /// Trims, drops trailing periods and removes articles.
    pub fn normalize(&self, sentence: &str) -> String {
        let trimmed = sentence.trim().trim_end_matches('.');
        self.articles.replace_all(trimmed, "").trim().to_string()
    }

    /// Compiles one sentence into a goal with the given weight.
    ///
    /// # Errors
    ///
    /// * `UnparsableSentence` for blank or `"none"` input and for sentences no pattern matches
    /// * `UnknownAction`, `UnknownItem`, `ItemNotUsable`, `UnknownPlace` or
    ///   `UnknownObject` when the sentence names something the world or catalog lacks
    pub fn compile(
        &self,
        sentence: &str,
        catalog: &ActionCatalog,
        world: &WorldState,
        weight: f64,
    ) -> Result<Goal> {
        if sentence.trim().is_empty() || sentence.trim().eq_ignore_ascii_case("none") {
            return Err(GoapError::UnparsableSentence(sentence.to_string()));
        }
        let normalized = self.normalize(sentence);

        for (pattern, regex) in &self.patterns {
            if let Some(captures) = regex.captures(&normalized) {
                let goal = build_goal(*pattern, &captures, catalog, world)
                    .map_err(|e| {
                        warn!("Goal sentence '{}' rejected: {}", sentence, e);
                        e
                    })?
                    .with_weight(weight);
                debug!("Compiled '{}' into goal '{}'", sentence, goal.name);
                return Ok(goal);
            }
        }
        warn!("Goal sentence '{}' matches no pattern", sentence);
        Err(GoapError::UnparsableSentence(sentence.to_string()))
    }
}

fn capture(captures: &Captures<'_>, index: usize) -> String {
    captures
        .get(index)
        .map(|m| normalize(m.as_str()))
        .unwrap_or_default()
}

fn build_goal(
    pattern: SentencePattern,
    captures: &Captures<'_>,
    catalog: &ActionCatalog,
    world: &WorldState,
) -> Result<Goal> {
    match pattern {
        SentencePattern::UseAt => {
            let (item, place) = (capture(captures, 1), capture(captures, 2));
            require_place(world, &place)?;
            use_goal(format!("Use_{}_at_{}", item, place), &item, catalog, world)
        }
        SentencePattern::Use => {
            let item = capture(captures, 1);
            use_goal(format!("Use_{}", item), &item, catalog, world)
        }
        SentencePattern::DoAt => {
            let (name, place) = (capture(captures, 1), capture(captures, 2));
            require_place(world, &place)?;
            let action = catalog
                .get(&name)
                .ok_or_else(|| GoapError::UnknownAction(name.clone()))?;
            let condition = GoalCondition::EffectsApplied {
                location: Some(place.clone()),
                effects: action.effects.clone(),
            };
            Ok(Goal::new(format!("Do_{}_at_{}", name, place), condition)
                .with_effect_hint(action.effects.clone()))
        }
        SentencePattern::Change => {
            let (key, object, value) = (
                capture(captures, 1),
                capture(captures, 2),
                capture(captures, 3),
            );
            let owner = if AGENT_ALIASES.contains(&object.as_str()) {
                StateOwner::Agent
            } else if world.has_place(&object) {
                StateOwner::Place(object.clone())
            } else if world.item(&object).is_some() {
                StateOwner::Item(object.clone())
            } else {
                return Err(GoapError::UnknownObject(object));
            };
            let name = format!("Change_{}_of_{}_to_{}", key, object, value);
            Ok(Goal::new(name, GoalCondition::StateEquals { owner, key, value }))
        }
        SentencePattern::GoTo => {
            let place = capture(captures, 1);
            require_place(world, &place)?;
            Ok(Goal::new(
                format!("Go_to_{}", place),
                GoalCondition::LocationIs { place },
            ))
        }
        SentencePattern::PickUpAt | SentencePattern::PickUp => {
            let item = capture(captures, 1);
            require_item(world, &item)?;
            let name = if pattern == SentencePattern::PickUpAt {
                format!("Pick_up_{}_at_{}", item, capture(captures, 2))
            } else {
                format!("Pick_up_{}", item)
            };
            Ok(Goal::new(name, GoalCondition::Carries { item: item.clone() })
                .with_effect_hint(hint_from(catalog, &format!("pick_{}", item))))
        }
        SentencePattern::DropAt => {
            let (item, place) = (capture(captures, 1), capture(captures, 2));
            require_item(world, &item)?;
            require_place(world, &place)?;
            Ok(Goal::new(
                format!("Drop_{}_at_{}", item, place),
                GoalCondition::Dropped {
                    item: item.clone(),
                    place,
                },
            )
            .with_effect_hint(hint_from(catalog, &format!("drop_{}", item))))
        }
        SentencePattern::Do => {
            let name = capture(captures, 1);
            let action = catalog
                .get(&name)
                .ok_or_else(|| GoapError::UnknownAction(name.clone()))?;
            let condition = if action.has_effects() {
                GoalCondition::EffectsApplied {
                    location: None,
                    effects: action.effects.clone(),
                }
            } else {
                GoalCondition::FlagTrue {
                    key: format!("did_{}", name),
                }
            };
            Ok(Goal::new(format!("Do_{}", name), condition).with_effect_hint(action.effects.clone()))
        }
    }
}

fn use_goal(name: String, item: &str, catalog: &ActionCatalog, world: &WorldState) -> Result<Goal> {
    let definition = world
        .item(item)
        .ok_or_else(|| GoapError::UnknownItem(item.to_string()))?;
    let behavior = definition
        .use_effects()
        .ok_or_else(|| GoapError::ItemNotUsable(item.to_string()))?;

    // Prefer the catalog's resolved effects; fall back to the raw behavior.
    let hint = match catalog.get(&format!("use_{}", item)) {
        Some(action) => action.effects.clone(),
        None => {
            let schema = AgentState::new();
            behavior
                .iter()
                .map(|(key, value)| Effect::classify(key, value.clone(), &schema))
                .collect()
        }
    };
    Ok(Goal::new(
        name,
        GoalCondition::FlagTrue {
            key: format!("used_{}", item),
        },
    )
    .with_effect_hint(hint))
}

fn hint_from(catalog: &ActionCatalog, action: &str) -> Vec<Effect> {
    catalog
        .get(action)
        .map(|a| a.effects.clone())
        .unwrap_or_default()
}

fn require_place(world: &WorldState, place: &str) -> Result<()> {
    if world.has_place(place) {
        Ok(())
    } else {
        Err(GoapError::UnknownPlace(place.to_string()))
    }
}

fn require_item(world: &WorldState, item: &str) -> Result<()> {
    if world.item(item).is_some() {
        Ok(())
    } else {
        Err(GoapError::UnknownItem(item.to_string()))
    }
}
