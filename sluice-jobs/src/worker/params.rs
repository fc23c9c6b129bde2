//! Parameter resolution
//!
//! Turns the raw parameters of a task into the parameters a worker runs
//! with: declared general settings are merged in, missing optional values
//! take their defaults and each declared value is coerced to its type tag.

use serde_json::{Number, Value};
use sluice_core::domain::job::ParamType;
use sluice_core::domain::task::{GeneralSettings, WorkerParams};
use thiserror::Error;

use super::{ParamSpec, WorkerSpec};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("missing required parameter '{0}'")]
    Missing(String),

    #[error("parameter '{name}' expects {expected}, got {value}")]
    Invalid {
        name: String,
        expected: &'static str,
        value: String,
    },

    #[error("missing general setting '{0}'")]
    MissingSetting(String),
}

/// Resolve the parameters a worker runs with
///
/// Undeclared parameters are passed through untouched. A declared general
/// setting does not override a parameter of the same name.
pub fn resolve(
    spec: &WorkerSpec,
    params: &WorkerParams,
    settings: &GeneralSettings,
) -> Result<WorkerParams, ParamError> {
    let mut resolved = params.clone();

    for name in &spec.global_settings {
        let value = settings
            .get(*name)
            .ok_or_else(|| ParamError::MissingSetting(name.to_string()))?;
        resolved
            .entry(name.to_string())
            .or_insert_with(|| Value::String(value.clone()));
    }

    for param in &spec.params {
        let value = match resolved.get(param.name).filter(|v| is_present(v)) {
            Some(value) => value.clone(),
            None => match &param.default {
                Some(default) => default.clone(),
                None if param.required => return Err(ParamError::Missing(param.name.to_string())),
                None => {
                    resolved.remove(param.name);
                    continue;
                }
            },
        };

        resolved.insert(param.name.to_string(), coerce(param, value)?);
    }

    Ok(resolved)
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn coerce(param: &ParamSpec, value: Value) -> Result<Value, ParamError> {
    let converted = match param.param_type {
        ParamType::String | ParamType::Text | ParamType::Sql => to_string(&value),
        ParamType::Number => to_number(&value),
        ParamType::Boolean => to_bool(&value),
        ParamType::StringList => to_list(&value, to_string),
        ParamType::NumberList => to_list(&value, to_number),
    };

    converted.ok_or_else(|| ParamError::Invalid {
        name: param.name.to_string(),
        expected: expected(param.param_type),
        value: value.to_string(),
    })
}

fn expected(param_type: ParamType) -> &'static str {
    match param_type {
        ParamType::String | ParamType::Text | ParamType::Sql => "a string",
        ParamType::Number => "a number",
        ParamType::Boolean => "a boolean",
        ParamType::StringList => "a list of strings",
        ParamType::NumberList => "a list of numbers",
    }
}

fn to_string(value: &Value) -> Option<Value> {
    match value {
        Value::String(_) => Some(value.clone()),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

fn to_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                return Some(Value::Number(n.into()));
            }
            s.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
        }
        _ => None,
    }
}

fn to_bool(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn to_list(value: &Value, item: fn(&Value) -> Option<Value>) -> Option<Value> {
    let items: Vec<Value> = match value {
        Value::Array(items) => items.clone(),
        Value::String(s) => s
            .split([',', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect(),
        _ => return None,
    };

    items
        .iter()
        .map(item)
        .collect::<Option<Vec<_>>>()
        .map(Value::Array)
}
