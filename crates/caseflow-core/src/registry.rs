//! Step template registry.
//!
//! Read-only lookup over agreement configuration. Each agreement's ordered
//! template list is loaded once into a contiguous arena and indexed by
//! `step_number - 1`, so "current template" and "next template" are O(1)
//! instead of a scan per lookup.

use std::collections::BTreeSet;
use std::collections::HashMap;

use crate::agreement::{AgreementConfig, StepTemplateConfig};
use crate::types::{AgreementId, Stage};
use crate::EngineError;

/// One immutable step definition, resolved from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StepTemplate {
    pub step_number: u32,
    pub name: String,
    pub stage: Stage,
    pub description: String,
    /// Days allowed at this step; 0 means no deadline.
    pub time_limit_days: u32,
    pub calendar_days: bool,
    pub required_participants: BTreeSet<String>,
    pub required_documents: BTreeSet<String>,
}

impl From<StepTemplateConfig> for StepTemplate {
    fn from(config: StepTemplateConfig) -> Self {
        Self {
            step_number: config.step_number,
            name: config.name,
            stage: config.stage,
            description: config.description,
            time_limit_days: config.time_limit_days,
            calendar_days: config.calendar_days,
            required_participants: config.required_participants,
            required_documents: config.required_documents,
        }
    }
}

/// Contiguous arena of one agreement's templates, index = step_number - 1.
#[derive(Debug, Clone)]
struct StepArena {
    steps: Vec<StepTemplate>,
}

impl StepArena {
    fn at(&self, step_number: u32) -> Option<&StepTemplate> {
        if step_number == 0 {
            return None;
        }
        self.steps.get((step_number - 1) as usize)
    }
}

/// Read-only registry of step templates for all configured agreements.
#[derive(Debug, Clone, Default)]
pub struct StepRegistry {
    agreements: HashMap<AgreementId, StepArena>,
}

impl StepRegistry {
    /// Build a registry from parsed agreement configurations.
    ///
    /// Configurations are already structurally validated by the parser
    /// (contiguous 1-based numbering); duplicates are rejected here.
    pub fn from_configs(
        configs: impl IntoIterator<Item = AgreementConfig>,
    ) -> Result<Self, EngineError> {
        let mut agreements = HashMap::new();

        for config in configs {
            let id = AgreementId::new(config.agreement_id.clone());
            let arena = StepArena {
                steps: config.steps.into_iter().map(StepTemplate::from).collect(),
            };
            tracing::debug!(
                agreement = %id,
                steps = arena.steps.len(),
                "loaded agreement step templates"
            );
            if agreements.insert(id.clone(), arena).is_some() {
                return Err(EngineError::Validation(format!(
                    "agreement '{}' is configured more than once",
                    id
                )));
            }
        }

        Ok(Self { agreements })
    }

    /// The full ordered template list for an agreement.
    pub fn steps_for(&self, agreement_id: &AgreementId) -> Result<&[StepTemplate], EngineError> {
        self.arena(agreement_id).map(|a| a.steps.as_slice())
    }

    /// The template at a specific step number.
    pub fn template_at(
        &self,
        agreement_id: &AgreementId,
        step_number: u32,
    ) -> Result<&StepTemplate, EngineError> {
        self.arena(agreement_id)?.at(step_number).ok_or_else(|| {
            EngineError::NotFound(format!(
                "agreement '{}' has no step {}",
                agreement_id, step_number
            ))
        })
    }

    /// The template after `step_number`, or `None` at the terminal step.
    ///
    /// `None` is not an error: it signals that the procedure has no further
    /// steps and the caller decides what that means (advance rejects with
    /// `NoNextStep`).
    pub fn next_template(
        &self,
        agreement_id: &AgreementId,
        step_number: u32,
    ) -> Result<Option<&StepTemplate>, EngineError> {
        // The current step must exist before "next" is a meaningful question.
        self.template_at(agreement_id, step_number)?;
        Ok(self.arena(agreement_id)?.at(step_number + 1))
    }

    /// The first step of an agreement's procedure (step 1).
    pub fn first_template(&self, agreement_id: &AgreementId) -> Result<&StepTemplate, EngineError> {
        self.template_at(agreement_id, 1)
    }

    /// Whether an agreement is configured.
    pub fn contains(&self, agreement_id: &AgreementId) -> bool {
        self.agreements.contains_key(agreement_id)
    }

    fn arena(&self, agreement_id: &AgreementId) -> Result<&StepArena, EngineError> {
        self.agreements.get(agreement_id).ok_or_else(|| {
            EngineError::NotFound(format!("agreement '{}' is not configured", agreement_id))
        })
    }
}
