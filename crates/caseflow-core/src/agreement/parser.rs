//! Agreement configuration parsing from YAML/JSON.
//!
//! The step sequence per agreement is a finite, linearly-ordered template
//! list fixed at configuration time. Parsing validates the structural rules
//! the registry relies on: contiguous 1-based numbering and non-blank names.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::Stage;

lazy_static! {
    // Agreement ids are file- and URL-safe slugs.
    static ref AGREEMENT_ID_PATTERN: Regex = Regex::new(r"^[a-z0-9][a-z0-9-]*$").unwrap();
}

/// Errors that can occur when loading agreement configuration.
#[derive(Error, Debug)]
pub enum AgreementError {
    #[error("Failed to read agreement file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Agreement validation failed: {0}")]
    ValidationError(String),
}

/// One step template as authored in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepTemplateConfig {
    /// 1-based position in the procedure; must be contiguous.
    pub step_number: u32,

    /// Step name (e.g. "Written grievance to department head").
    pub name: String,

    /// Coarse phase this step belongs to.
    pub stage: Stage,

    /// Longer description shown in views.
    #[serde(default)]
    pub description: String,

    /// Days allowed at this step; 0 means no deadline.
    pub time_limit_days: u32,

    /// Count calendar days instead of business days.
    #[serde(default)]
    pub calendar_days: bool,

    /// Who must take part at this step.
    #[serde(default)]
    pub required_participants: BTreeSet<String>,

    /// Documents that must be on file at this step.
    #[serde(default)]
    pub required_documents: BTreeSet<String>,
}

/// An agreement's grievance procedure configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementConfig {
    /// Stable slug identifying the agreement.
    pub agreement_id: String,

    /// Human-readable agreement name.
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Ordered step templates.
    pub steps: Vec<StepTemplateConfig>,
}

impl AgreementConfig {
    /// Parse an agreement from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, AgreementError> {
        let config: AgreementConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse an agreement from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, AgreementError> {
        let config: AgreementConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse an agreement from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, AgreementError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse an agreement from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AgreementError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Validate structural rules the registry relies on.
    fn validate(&self) -> Result<(), AgreementError> {
        if !AGREEMENT_ID_PATTERN.is_match(&self.agreement_id) {
            return Err(AgreementError::ValidationError(format!(
                "agreement_id '{}' must be a lowercase slug ([a-z0-9-])",
                self.agreement_id
            )));
        }

        if self.name.trim().is_empty() {
            return Err(AgreementError::ValidationError(
                "agreement name cannot be blank".to_string(),
            ));
        }

        if self.steps.is_empty() {
            return Err(AgreementError::ValidationError(
                "an agreement must define at least one step".to_string(),
            ));
        }

        // Templates are numbered from 1 contiguously; the registry indexes by
        // step_number - 1 on that basis.
        for (index, step) in self.steps.iter().enumerate() {
            let expected = (index + 1) as u32;
            if step.step_number != expected {
                return Err(AgreementError::ValidationError(format!(
                    "step numbers must be contiguous from 1: position {} has step_number {}",
                    index + 1,
                    step.step_number
                )));
            }
            if step.name.trim().is_empty() {
                return Err(AgreementError::ValidationError(format!(
                    "step {} has a blank name",
                    step.step_number
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_AGREEMENT: &str = r#"
agreement_id: "cba-2024-local-417"
name: "Local 417 Collective Agreement 2024"
steps:
  - step_number: 1
    name: "Informal discussion with supervisor"
    stage: informal
    time_limit_days: 10
  - step_number: 2
    name: "Written grievance to department head"
    stage: formal
    time_limit_days: 15
    required_participants: [grievor, steward]
    required_documents: [grievance-form]
  - step_number: 3
    name: "Referral to arbitration"
    stage: arbitration
    time_limit_days: 0
    calendar_days: true
"#;

    #[test]
    fn test_parse_valid_agreement() {
        let config = AgreementConfig::from_yaml(VALID_AGREEMENT).unwrap();
        assert_eq!(config.agreement_id, "cba-2024-local-417");
        assert_eq!(config.steps.len(), 3);
        assert_eq!(config.steps[0].stage, Stage::Informal);
        assert_eq!(config.steps[1].required_participants.len(), 2);
        // Untimed terminal step
        assert_eq!(config.steps[2].time_limit_days, 0);
    }

    #[test]
    fn test_rejects_non_contiguous_steps() {
        let yaml = r#"
agreement_id: "cba-gap"
name: "Gap"
steps:
  - step_number: 1
    name: "One"
    stage: informal
    time_limit_days: 5
  - step_number: 3
    name: "Three"
    stage: formal
    time_limit_days: 5
"#;
        let result = AgreementConfig::from_yaml(yaml);
        assert!(matches!(result, Err(AgreementError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_numbering_from_zero() {
        let yaml = r#"
agreement_id: "cba-zero"
name: "Zero"
steps:
  - step_number: 0
    name: "Zero"
    stage: informal
    time_limit_days: 5
"#;
        assert!(AgreementConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_empty_steps() {
        let yaml = r#"
agreement_id: "cba-empty"
name: "Empty"
steps: []
"#;
        assert!(AgreementConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_bad_slug() {
        let yaml = r#"
agreement_id: "CBA 2024!"
name: "Bad slug"
steps:
  - step_number: 1
    name: "One"
    stage: informal
    time_limit_days: 5
"#;
        let result = AgreementConfig::from_yaml(yaml);
        assert!(matches!(result, Err(AgreementError::ValidationError(_))));
    }

    #[test]
    fn test_json_round_trip() {
        let config = AgreementConfig::from_yaml(VALID_AGREEMENT).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let reparsed = AgreementConfig::from_json(&json).unwrap();
        assert_eq!(reparsed.steps, config.steps);
    }
}
