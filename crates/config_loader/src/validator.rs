//! 配置校验模块
//!
//! 校验规则：
//! - purge_delay > 0
//! - analytics_key 非空
//! - pump 名称非空且唯一
//! - 过滤规则的 values 非空
//!
//! 未知的 sink 类型不在此处校验，运行时跳过。

use std::collections::HashSet;

use contracts::{ContractError, PumpBlueprint};

/// 校验 PumpBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PumpBlueprint) -> Result<(), ContractError> {
    validate_purge_delay(blueprint)?;
    validate_analytics_key(blueprint)?;
    validate_pump_names(blueprint)?;
    validate_filters(blueprint)?;
    Ok(())
}

/// 校验清理周期
fn validate_purge_delay(blueprint: &PumpBlueprint) -> Result<(), ContractError> {
    if blueprint.purge_delay == 0 {
        return Err(ContractError::config_validation(
            "purge_delay",
            "purge_delay must be > 0",
        ));
    }
    Ok(())
}

fn validate_analytics_key(blueprint: &PumpBlueprint) -> Result<(), ContractError> {
    if blueprint.analytics_key.trim().is_empty() {
        return Err(ContractError::config_validation(
            "analytics_key",
            "analytics_key cannot be empty",
        ));
    }
    Ok(())
}

/// 校验 pump 名称唯一性
fn validate_pump_names(blueprint: &PumpBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, pump) in blueprint.pumps.iter().enumerate() {
        if pump.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("pumps[{}].name", idx),
                "pump name cannot be empty",
            ));
        }
        if !seen.insert(&pump.name) {
            return Err(ContractError::config_validation(
                format!("pumps[name={}]", pump.name),
                "duplicate pump name",
            ));
        }
    }
    Ok(())
}

/// 校验过滤规则
fn validate_filters(blueprint: &PumpBlueprint) -> Result<(), ContractError> {
    for pump in &blueprint.pumps {
        for (idx, rule) in pump.filters.rules.iter().enumerate() {
            if rule.values.is_empty() {
                return Err(ContractError::config_validation(
                    format!("pumps[{}].filters.rules[{}].values", pump.name, idx),
                    format!("filter rule on '{}' has no values", rule.field),
                ));
            }
        }
    }
    Ok(())
}
