//! `caseflow` — operator tool for agreement configuration and deadlines.
//!
//! Validates agreement step-template files (schema plus structural rules),
//! prints step tables, and runs the deadline calculator from the shell.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};

use caseflow_core::agreement::schema::validate_agreement_schema;
use caseflow_core::deadline::compute_due_date;
use caseflow_core::AgreementConfig;

#[derive(Parser)]
#[command(name = "caseflow", version, about = "Grievance procedure configuration tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate an agreement configuration file (schema + structural rules)
    Validate {
        /// Path to the agreement YAML or JSON file
        file: PathBuf,
    },

    /// Print the step table for an agreement file
    Steps {
        /// Path to the agreement YAML or JSON file
        file: PathBuf,

        /// Emit the parsed configuration as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Compute a due date from an anchor date and a day count
    DueDate {
        /// Anchor date (YYYY-MM-DD or RFC 3339 timestamp)
        #[arg(long)]
        anchor: String,

        /// Number of days allowed
        #[arg(long)]
        days: i64,

        /// Count calendar days instead of business days
        #[arg(long)]
        calendar: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Validate { file } => validate(&file),
        Command::Steps { file, json } => steps(&file, json),
        Command::DueDate {
            anchor,
            days,
            calendar,
        } => due_date(&anchor, days, calendar),
    }
}

fn validate(file: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;

    // Schema first for precise authoring errors, then the structural rules
    // the parser enforces on top (contiguous numbering).
    let value: serde_json::Value = if is_json(file) {
        serde_json::from_str(&contents).context("parsing JSON")?
    } else {
        serde_yaml::from_str(&contents).context("parsing YAML")?
    };

    if let Err(errors) = validate_agreement_schema(&value) {
        for error in &errors {
            eprintln!("schema: {}", error);
        }
        bail!("{} schema violation(s) in {}", errors.len(), file.display());
    }

    let config = parse_config(file, &contents)?;
    tracing::debug!(file = %file.display(), agreement = %config.agreement_id, "agreement validated");
    println!(
        "OK: {} ({} steps)",
        config.agreement_id,
        config.steps.len()
    );
    Ok(())
}

fn steps(file: &Path, json: bool) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let config = parse_config(file, &contents)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("{} — {}", config.agreement_id, config.name);
    println!("{:<5} {:<12} {:<40} {:>6}  {}", "step", "stage", "name", "days", "basis");
    for step in &config.steps {
        let basis = if step.time_limit_days == 0 {
            "untimed"
        } else if step.calendar_days {
            "calendar"
        } else {
            "business"
        };
        println!(
            "{:<5} {:<12} {:<40} {:>6}  {}",
            step.step_number,
            step.stage.to_string(),
            step.name,
            step.time_limit_days,
            basis
        );
    }
    Ok(())
}

fn due_date(anchor: &str, days: i64, calendar: bool) -> Result<()> {
    let anchor = parse_anchor(anchor)?;
    let due = compute_due_date(anchor, days, calendar)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    println!("{}", due.date_naive());
    Ok(())
}

fn parse_config(file: &Path, contents: &str) -> Result<AgreementConfig> {
    let config = if is_json(file) {
        AgreementConfig::from_json(contents)
    } else {
        AgreementConfig::from_yaml(contents)
    };
    config.with_context(|| format!("loading {}", file.display()))
}

fn parse_anchor(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is valid");
        return Ok(Utc.from_utc_datetime(&midnight));
    }
    bail!("anchor must be YYYY-MM-DD or an RFC 3339 timestamp, got '{}'", text)
}

fn is_json(file: &Path) -> bool {
    file.extension().is_some_and(|ext| ext == "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_anchor_date_only() {
        let anchor = parse_anchor("2025-12-01").unwrap();
        assert_eq!(anchor.date_naive().to_string(), "2025-12-01");
    }

    #[test]
    fn test_parse_anchor_rfc3339() {
        let anchor = parse_anchor("2025-12-01T09:30:00Z").unwrap();
        assert_eq!(anchor.date_naive().to_string(), "2025-12-01");
    }

    #[test]
    fn test_parse_anchor_rejects_garbage() {
        assert!(parse_anchor("next tuesday").is_err());
    }
}
