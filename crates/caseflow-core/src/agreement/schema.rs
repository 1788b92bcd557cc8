//! JSON Schema validation for agreement configuration.
//!
//! Agreement documents are validated against spec/agreement.schema.json
//! before structural parsing, so authoring tools and the CLI report the same
//! errors for the same documents.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded agreement schema (loaded at compile time).
const AGREEMENT_SCHEMA_JSON: &str = include_str!("../../../../spec/agreement.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema validation.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

/// Get or initialize the compiled schema validator.
fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(AGREEMENT_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile schema: {}", e)),
        }
    });

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(SchemaError::LoadError(e.clone())),
    }
}

/// Validate an agreement JSON value against the schema.
///
/// Returns Ok(()) if valid, or the list of validation error messages.
pub fn validate_agreement_schema(agreement_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(agreement_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check if an agreement JSON value is valid against the schema.
///
/// Returns true if valid. Use `validate_agreement_schema` for detailed
/// error messages.
pub fn is_valid_agreement(agreement_json: &serde_json::Value) -> bool {
    get_validator()
        .map(|v| v.is_valid(agreement_json))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_agreement_passes_schema() {
        let value = serde_json::json!({
            "agreement_id": "cba-2024-local-417",
            "name": "Local 417 Collective Agreement 2024",
            "steps": [
                {
                    "step_number": 1,
                    "name": "Informal discussion",
                    "stage": "informal",
                    "time_limit_days": 10
                }
            ]
        });
        assert!(validate_agreement_schema(&value).is_ok());
    }

    #[test]
    fn test_missing_steps_fails() {
        let value = serde_json::json!({
            "agreement_id": "cba-2024",
            "name": "Missing steps"
        });
        let result = validate_agreement_schema(&value);
        assert!(result.is_err());
        assert!(!result.unwrap_err().is_empty());
    }

    #[test]
    fn test_empty_steps_fails() {
        let value = serde_json::json!({
            "agreement_id": "cba-2024",
            "name": "Empty",
            "steps": []
        });
        assert!(validate_agreement_schema(&value).is_err());
    }

    #[test]
    fn test_unknown_stage_fails() {
        let value = serde_json::json!({
            "agreement_id": "cba-2024",
            "name": "Bad stage",
            "steps": [
                {
                    "step_number": 1,
                    "name": "Step",
                    "stage": "mediation",
                    "time_limit_days": 5
                }
            ]
        });
        assert!(validate_agreement_schema(&value).is_err());
    }

    #[test]
    fn test_negative_time_limit_fails() {
        let value = serde_json::json!({
            "agreement_id": "cba-2024",
            "name": "Negative",
            "steps": [
                {
                    "step_number": 1,
                    "name": "Step",
                    "stage": "formal",
                    "time_limit_days": -3
                }
            ]
        });
        assert!(validate_agreement_schema(&value).is_err());
    }

    #[test]
    fn test_uppercase_slug_fails() {
        let value = serde_json::json!({
            "agreement_id": "CBA-2024",
            "name": "Bad slug",
            "steps": [
                {
                    "step_number": 1,
                    "name": "Step",
                    "stage": "formal",
                    "time_limit_days": 5
                }
            ]
        });
        assert!(validate_agreement_schema(&value).is_err());
    }

    #[test]
    fn test_additional_properties_fail() {
        let value = serde_json::json!({
            "agreement_id": "cba-2024",
            "name": "Extra",
            "steps": [
                {
                    "step_number": 1,
                    "name": "Step",
                    "stage": "formal",
                    "time_limit_days": 5
                }
            ],
            "unknown_field": "should fail"
        });
        assert!(validate_agreement_schema(&value).is_err());
    }

    #[test]
    fn test_is_valid_helper() {
        let valid = serde_json::json!({
            "agreement_id": "cba-2024",
            "name": "Valid",
            "steps": [
                {
                    "step_number": 1,
                    "name": "Step",
                    "stage": "informal",
                    "time_limit_days": 0
                }
            ]
        });
        assert!(is_valid_agreement(&valid));

        let invalid = serde_json::json!({ "name": "Only name" });
        assert!(!is_valid_agreement(&invalid));
    }
}
