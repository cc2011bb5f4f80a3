//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::PumpBlueprint;
use dispatcher::SinkRegistry;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    purge_delay: u64,
    store: String,
    record_format: String,
    pump_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint, &SinkRegistry::with_builtin());

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    purge_delay: blueprint.purge_delay,
                    store: blueprint.store.kind.clone(),
                    record_format: format!("{:?}", blueprint.record_format),
                    pump_count: blueprint.pumps.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PumpBlueprint, registry: &SinkRegistry) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.pumps.is_empty() {
        warnings.push("No pumps configured - drained records will be discarded".to_string());
    }

    for pump in &blueprint.pumps {
        let sink_type = pump.resolved_type();
        if !registry.contains(sink_type) {
            warnings.push(format!(
                "Pump '{}' has unknown type '{}' - it will be skipped at startup",
                pump.name, sink_type
            ));
        }

        if pump.timeout == 0 {
            warnings.push(format!(
                "Pump '{}' has no timeout - a stuck write blocks every later purge",
                pump.name
            ));
        } else if pump.timeout > blueprint.purge_delay {
            warnings.push(format!(
                "Pump '{}' timeout ({}s) exceeds purge_delay ({}s)",
                pump.name, pump.timeout, blueprint.purge_delay
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Purge delay: {}s", summary.purge_delay);
            println!("  Store: {}", summary.store);
            println!("  Record format: {}", summary.record_format);
            println!("  Pumps: {}", summary.pump_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
