//! Ordered stage registry with declarative roles.
//!
//! The registry is built once at startup. Validation guarantees that the
//! roles form a pipeline the supervisor can drive: one restart target when
//! any gate or pause point exists, pause points before it, gates after it.

mod spec;

pub use spec::{StageRoles, StageSpec};

use crate::errors::RegistryError;
use crate::stages::Stage;
use std::collections::HashSet;
use std::sync::Arc;

/// Canonical stage names of the idea-to-code product pipeline.
pub mod stage_names {
    /// Breaks the idea into a work plan.
    pub const PLANNER: &str = "planner";
    /// Drafts the requirements specification.
    pub const REQUIREMENTS: &str = "requirements";
    /// Chooses architecture and tech stack.
    pub const ARCHITECT: &str = "architect";
    /// Infers the data schema.
    pub const SCHEMA: &str = "schema";
    /// Renders the UX mockup awaiting approval.
    pub const MOCKUP: &str = "mockup";
    /// Generates the application code.
    pub const BUILDER: &str = "builder";
    /// Writes project documentation.
    pub const DOCUMENTER: &str = "documenter";
    /// Generates and runs tests.
    pub const TESTER: &str = "tester";
    /// Produces the security report.
    pub const SECURITY: &str = "security";
}

/// The nine stage implementations of the idea-to-code pipeline.
#[derive(Debug, Clone)]
pub struct IdeaToCodeStages {
    /// Work plan stage.
    pub planner: Arc<dyn Stage>,
    /// Requirements stage.
    pub requirements: Arc<dyn Stage>,
    /// Architecture stage.
    pub architect: Arc<dyn Stage>,
    /// Schema stage.
    pub schema: Arc<dyn Stage>,
    /// Mockup stage (pause point).
    pub mockup: Arc<dyn Stage>,
    /// Code generation stage (restart target).
    pub builder: Arc<dyn Stage>,
    /// Documentation stage (skipped on correction).
    pub documenter: Arc<dyn Stage>,
    /// Test stage (gate).
    pub tester: Arc<dyn Stage>,
    /// Security review stage (gate).
    pub security: Arc<dyn Stage>,
}

/// An immutable, validated, ordered list of stages.
#[derive(Debug, Clone)]
pub struct StageRegistry {
    stages: Vec<StageSpec>,
    restart_target: Option<usize>,
}

impl StageRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> StageRegistryBuilder {
        StageRegistryBuilder::default()
    }

    /// Builds the product pipeline with its canonical role layout.
    ///
    /// # Errors
    ///
    /// Returns an error if a runner's name does not match its slot.
    pub fn idea_to_code(stages: IdeaToCodeStages) -> Result<Self, RegistryError> {
        use stage_names::{
            ARCHITECT, BUILDER, DOCUMENTER, MOCKUP, PLANNER, REQUIREMENTS, SCHEMA, SECURITY, TESTER,
        };

        Self::builder()
            .stage(StageSpec::new(PLANNER, stages.planner).with_description("Break the idea into a work plan"))
            .stage(
                StageSpec::new(REQUIREMENTS, stages.requirements)
                    .with_description("Draft the requirements specification"),
            )
            .stage(StageSpec::new(ARCHITECT, stages.architect).with_description("Choose architecture and stack"))
            .stage(StageSpec::new(SCHEMA, stages.schema).with_description("Infer the data schema"))
            .stage(
                StageSpec::new(MOCKUP, stages.mockup)
                    .with_description("Render the UX mockup for review")
                    .pause_point(),
            )
            .stage(
                StageSpec::new(BUILDER, stages.builder)
                    .with_description("Generate application code")
                    .restart_target(),
            )
            .stage(
                StageSpec::new(DOCUMENTER, stages.documenter)
                    .with_description("Write project documentation")
                    .skip_on_correction(),
            )
            .stage(
                StageSpec::new(TESTER, stages.tester)
                    .with_description("Generate and run tests")
                    .gate(),
            )
            .stage(
                StageSpec::new(SECURITY, stages.security)
                    .with_description("Audit the generated code")
                    .gate(),
            )
            .build()
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Returns the stage at `index`.
    #[must_use]
    pub fn stage_at(&self, index: usize) -> Option<&StageSpec> {
        self.stages.get(index)
    }

    /// Looks up a stage by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|spec| spec.name == name)
    }

    /// Returns the position of a stage.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|spec| spec.name == name)
    }

    /// Returns the index of the restart target, if the pipeline has one.
    #[must_use]
    pub fn restart_target_index(&self) -> Option<usize> {
        self.restart_target
    }

    /// Returns the stage names in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|spec| spec.name.as_str()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the registry has no stages.
    ///
    /// A built registry is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Builder for [`StageRegistry`].
#[derive(Debug, Default)]
pub struct StageRegistryBuilder {
    stages: Vec<StageSpec>,
}

impl StageRegistryBuilder {
    /// Appends a stage.
    #[must_use]
    pub fn stage(mut self, spec: StageSpec) -> Self {
        self.stages.push(spec);
        self
    }

    /// Appends a plain work stage.
    #[must_use]
    pub fn work(self, runner: Arc<dyn Stage>) -> Self {
        let name = runner.name().to_string();
        self.stage(StageSpec::new(name, runner))
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Validates and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns an error when the pipeline is empty, a name is invalid or
    /// duplicated, or the roles are inconsistent.
    pub fn build(self) -> Result<StageRegistry, RegistryError> {
        if self.stages.is_empty() {
            return Err(RegistryError::new("REGISTRY-EMPTY", "Pipeline has no stages"));
        }

        let mut seen = HashSet::new();
        for spec in &self.stages {
            spec.validate()?;
            if !seen.insert(spec.name.as_str()) {
                return Err(RegistryError::new(
                    "REGISTRY-DUPLICATE",
                    format!("Stage '{}' is registered more than once", spec.name),
                )
                .with_stages(vec![spec.name.clone()]));
            }
        }

        let restart_targets: Vec<usize> = self
            .stages
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.roles.is_restart_target)
            .map(|(index, _)| index)
            .collect();

        if restart_targets.len() > 1 {
            return Err(RegistryError::new(
                "REGISTRY-RESTART",
                "Only one stage may be the restart target",
            )
            .with_stages(self.names_at(&restart_targets)));
        }
        let restart_target = restart_targets.first().copied();

        let pause_points = self.indices_where(|roles| roles.is_pause_point);
        let gates = self.indices_where(|roles| roles.is_gate);

        let Some(restart) = restart_target else {
            if pause_points.is_empty() && gates.is_empty() {
                return Ok(StageRegistry {
                    stages: self.stages,
                    restart_target: None,
                });
            }
            let mut involved = pause_points;
            involved.extend(gates);
            return Err(RegistryError::new(
                "REGISTRY-RESTART",
                "Pipelines with gates or pause points need a restart target",
            )
            .with_stages(self.names_at(&involved)));
        };

        let misplaced_pauses: Vec<usize> = pause_points.into_iter().filter(|i| *i >= restart).collect();
        if !misplaced_pauses.is_empty() {
            return Err(RegistryError::new(
                "REGISTRY-ORDER",
                "Pause points must come before the restart target",
            )
            .with_stages(self.names_at(&misplaced_pauses)));
        }

        let misplaced_gates: Vec<usize> = gates.into_iter().filter(|i| *i <= restart).collect();
        if !misplaced_gates.is_empty() {
            return Err(RegistryError::new(
                "REGISTRY-ORDER",
                "Gates must come after the restart target",
            )
            .with_stages(self.names_at(&misplaced_gates)));
        }

        Ok(StageRegistry {
            stages: self.stages,
            restart_target,
        })
    }

    fn indices_where(&self, predicate: impl Fn(&StageRoles) -> bool) -> Vec<usize> {
        self.stages
            .iter()
            .enumerate()
            .filter(|(_, spec)| predicate(&spec.roles))
            .map(|(index, _)| index)
            .collect()
    }

    fn names_at(&self, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .filter_map(|index| self.stages.get(*index))
            .map(|spec| spec.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::NoOpStage;
    use pretty_assertions::assert_eq;

    fn noop(name: &str) -> Arc<dyn Stage> {
        Arc::new(NoOpStage::new(name))
    }

    fn spec(name: &str) -> StageSpec {
        StageSpec::new(name, noop(name))
    }

    fn product_stages() -> IdeaToCodeStages {
        IdeaToCodeStages {
            planner: noop("planner"),
            requirements: noop("requirements"),
            architect: noop("architect"),
            schema: noop("schema"),
            mockup: noop("mockup"),
            builder: noop("builder"),
            documenter: noop("documenter"),
            tester: noop("tester"),
            security: noop("security"),
        }
    }

    #[test]
    fn test_idea_to_code_layout() {
        let registry = StageRegistry::idea_to_code(product_stages()).unwrap();

        assert_eq!(registry.len(), 9);
        assert_eq!(registry.restart_target_index(), registry.index_of("builder"));
        assert!(registry.get("mockup").unwrap().roles.is_pause_point);
        assert!(registry.get("tester").unwrap().roles.is_gate);
        assert!(registry.get("security").unwrap().roles.is_gate);
        assert!(registry.get("documenter").unwrap().roles.skip_on_correction);
        assert_eq!(
            registry.stage_names(),
            vec![
                "planner", "requirements", "architect", "schema", "mockup", "builder",
                "documenter", "tester", "security"
            ]
        );
    }

    #[test]
    fn test_idea_to_code_rejects_misnamed_runner() {
        let mut stages = product_stages();
        stages.tester = noop("qa");
        assert!(StageRegistry::idea_to_code(stages).is_err());
    }

    #[test]
    fn test_plain_pipeline_needs_no_restart_target() {
        let registry = StageRegistry::builder()
            .work(noop("a"))
            .work(noop("b"))
            .build()
            .unwrap();

        assert_eq!(registry.restart_target_index(), None);
        assert_eq!(registry.stage_at(1).unwrap().name, "b");
    }

    #[test]
    fn test_empty_registry_rejected() {
        let err = StageRegistry::builder().build().unwrap_err();
        assert_eq!(err.code, "REGISTRY-EMPTY");
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = StageRegistry::builder()
            .stage(spec("a"))
            .stage(spec("a"))
            .build()
            .unwrap_err();
        assert_eq!(err.code, "REGISTRY-DUPLICATE");
    }

    #[test]
    fn test_gate_without_restart_target_rejected() {
        let err = StageRegistry::builder()
            .stage(spec("build"))
            .stage(spec("test").gate())
            .build()
            .unwrap_err();
        assert_eq!(err.code, "REGISTRY-RESTART");
        assert_eq!(err.stages, vec!["test".to_string()]);
    }

    #[test]
    fn test_two_restart_targets_rejected() {
        let err = StageRegistry::builder()
            .stage(spec("a").restart_target())
            .stage(spec("b").restart_target())
            .build()
            .unwrap_err();
        assert_eq!(err.code, "REGISTRY-RESTART");
        assert_eq!(err.stages.len(), 2);
    }

    #[test]
    fn test_role_ordering_enforced() {
        let pause_after_restart = StageRegistry::builder()
            .stage(spec("build").restart_target())
            .stage(spec("review").pause_point())
            .build()
            .unwrap_err();
        assert_eq!(pause_after_restart.code, "REGISTRY-ORDER");

        let gate_before_restart = StageRegistry::builder()
            .stage(spec("lint").gate())
            .stage(spec("build").restart_target())
            .build()
            .unwrap_err();
        assert_eq!(gate_before_restart.code, "REGISTRY-ORDER");
        assert_eq!(gate_before_restart.stages, vec!["lint".to_string()]);
    }
}
