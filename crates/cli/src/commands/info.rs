//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::{FilterAction, PumpBlueprint, SinkConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    purge: PurgeInfo,
    store: StoreInfo,
    pumps: Vec<PumpInfo>,
}

#[derive(Serialize)]
struct PurgeInfo {
    purge_delay_secs: u64,
    analytics_key: String,
    record_format: String,
    overrun_policy: String,
    omit_detailed_recording: bool,
}

#[derive(Serialize)]
struct StoreInfo {
    kind: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    options: Vec<String>,
}

#[derive(Serialize)]
struct PumpInfo {
    name: String,
    sink_type: String,
    timeout_secs: u64,
    omit_detailed_recording: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    filters: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn describe_filters(pump: &SinkConfig) -> Vec<String> {
    pump.filters
        .rules
        .iter()
        .map(|rule| {
            let action = match rule.action {
                FilterAction::Include => "include",
                FilterAction::Exclude => "exclude",
            };
            format!("{} {} in [{}]", action, rule.field, rule.values.join(", "))
        })
        .collect()
}

fn build_config_info(blueprint: &PumpBlueprint, args: &InfoArgs) -> ConfigInfo {
    let pumps = blueprint
        .pumps
        .iter()
        .map(|pump| PumpInfo {
            name: pump.name.clone(),
            sink_type: pump.resolved_type().to_string(),
            timeout_secs: pump.timeout,
            omit_detailed_recording: pump.omit_detailed_recording,
            filters: if args.pumps {
                describe_filters(pump)
            } else {
                Vec::new()
            },
            params: if args.pumps {
                pump.params.clone().into_iter().collect()
            } else {
                BTreeMap::new()
            },
        })
        .collect();

    // option values may hold credentials
    let mut options: Vec<String> = blueprint.store.options.keys().cloned().collect();
    options.sort();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        purge: PurgeInfo {
            purge_delay_secs: blueprint.purge_delay,
            analytics_key: blueprint.analytics_key.clone(),
            record_format: format!("{:?}", blueprint.record_format),
            overrun_policy: format!("{:?}", blueprint.overrun_policy),
            omit_detailed_recording: blueprint.omit_detailed_recording,
        },
        store: StoreInfo {
            kind: blueprint.store.kind.clone(),
            options,
        },
        pumps,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Analytics Pump Configuration                   ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let purge = &info.purge;
    println!("⏱  Purge");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Delay: {}s", purge.purge_delay_secs);
    println!("   ├─ Key: {}", purge.analytics_key);
    println!("   ├─ Record format: {}", purge.record_format);
    println!("   ├─ Overrun policy: {}", purge.overrun_policy);
    println!("   └─ Omit detailed recording: {}", purge.omit_detailed_recording);

    println!("\n🗄  Store");
    if info.store.options.is_empty() {
        println!("   └─ Kind: {}", info.store.kind);
    } else {
        println!("   ├─ Kind: {}", info.store.kind);
        println!("   └─ Options: {}", info.store.options.join(", "));
    }

    println!("\n📤 Pumps ({})", info.pumps.len());
    for (i, pump) in info.pumps.iter().enumerate() {
        let is_last = i == info.pumps.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        let timeout = if pump.timeout_secs == 0 {
            "none".to_string()
        } else {
            format!("{}s", pump.timeout_secs)
        };
        println!(
            "   {} {} ({}, timeout {}, omit detail {})",
            prefix, pump.name, pump.sink_type, timeout, pump.omit_detailed_recording
        );

        for filter in &pump.filters {
            println!("   {}  · {}", child_prefix, filter);
        }
        for (key, value) in &pump.params {
            println!("   {}  {} = {}", child_prefix, key, value);
        }
    }

    println!();
}
