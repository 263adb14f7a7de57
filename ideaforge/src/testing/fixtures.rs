//! Ready-made pipelines for supervisor tests.

use std::collections::HashMap;
use std::sync::Arc;

use super::ScriptedStage;
use crate::errors::RegistryError;
use crate::registry::{stage_names, IdeaToCodeStages, StageRegistry};
use crate::stages::Stage;

/// Stage names of the idea-to-code pipeline in execution order.
pub const IDEA_TO_CODE_ORDER: [&str; 9] = [
    stage_names::PLANNER,
    stage_names::REQUIREMENTS,
    stage_names::ARCHITECT,
    stage_names::SCHEMA,
    stage_names::MOCKUP,
    stage_names::BUILDER,
    stage_names::DOCUMENTER,
    stage_names::TESTER,
    stage_names::SECURITY,
];

/// The idea-to-code pipeline built from [`ScriptedStage`]s.
///
/// Every stage completes by default; scripts are changed through
/// [`ScriptedPipeline::stage`], and any slot can be swapped for another
/// implementation before the registry is built.
#[derive(Debug)]
pub struct ScriptedPipeline {
    stages: HashMap<&'static str, Arc<ScriptedStage>>,
    overrides: HashMap<&'static str, Arc<dyn Stage>>,
}

impl Default for ScriptedPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPipeline {
    /// Creates the pipeline with all stages completing.
    #[must_use]
    pub fn new() -> Self {
        let stages = IDEA_TO_CODE_ORDER
            .iter()
            .map(|name| (*name, Arc::new(ScriptedStage::new(*name))))
            .collect();
        Self {
            stages,
            overrides: HashMap::new(),
        }
    }

    /// Replaces the scripted stage in one slot.
    #[must_use]
    pub fn with_stage(mut self, name: &'static str, stage: ScriptedStage) -> Self {
        self.stages.insert(name, Arc::new(stage));
        self
    }

    /// Puts a different implementation in one slot.
    #[must_use]
    pub fn with_override(mut self, name: &'static str, stage: Arc<dyn Stage>) -> Self {
        self.overrides.insert(name, stage);
        self
    }

    /// Returns the scripted stage in a slot.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a stage of the pipeline.
    #[must_use]
    pub fn stage(&self, name: &str) -> Arc<ScriptedStage> {
        self.stages
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("no scripted stage named '{name}'"))
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if an override's name does not match its slot.
    pub fn registry(&self) -> Result<StageRegistry, RegistryError> {
        let slot = |name: &'static str| -> Arc<dyn Stage> {
            self.overrides
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.stage(name) as Arc<dyn Stage>)
        };

        StageRegistry::idea_to_code(IdeaToCodeStages {
            planner: slot(stage_names::PLANNER),
            requirements: slot(stage_names::REQUIREMENTS),
            architect: slot(stage_names::ARCHITECT),
            schema: slot(stage_names::SCHEMA),
            mockup: slot(stage_names::MOCKUP),
            builder: slot(stage_names::BUILDER),
            documenter: slot(stage_names::DOCUMENTER),
            tester: slot(stage_names::TESTER),
            security: slot(stage_names::SECURITY),
        })
    }
}
