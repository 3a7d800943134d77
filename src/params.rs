//! Interactive parameter collection for a selected plan.
//!
//! Walks the plan's descriptors in declared order, applies defaults, enforces
//! required/enum constraints, coerces the raw input to its semantic type, and
//! finally validates the whole set against the plan-derived schema. Invalid
//! input on a single field re-prompts; only the final schema gate is fatal.

use anyhow::{Result, anyhow};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

use crate::bundle::{ParamType, ParameterDescriptor, Parameters, Plan};
use crate::prompt::{MAX_PROMPT_ATTEMPTS, Prompt};
use crate::schema;

#[derive(Debug, Error)]
pub enum CoercionError {
    #[error("input must be a boolean")]
    Boolean,
    #[error("input must be an integer")]
    Integer,
    #[error("input must be a float")]
    Float,
}

/// Coerce a raw input string to the descriptor's semantic type.
///
/// String, enum, and unrecognized types pass through unchanged and never
/// fail.
pub fn coerce(input: &str, param_type: &ParamType) -> Result<JsonValue, CoercionError> {
    match param_type {
        ParamType::Boolean => parse_bool(input)
            .map(JsonValue::Bool)
            .ok_or(CoercionError::Boolean),
        ParamType::Integer => parse_int(input)
            .map(JsonValue::from)
            .ok_or(CoercionError::Integer),
        ParamType::Number => input
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .ok_or(CoercionError::Float),
        _ => Ok(JsonValue::String(input.to_string())),
    }
}

/// Canonical boolean tokens: `1,t,T,TRUE,true,True` and their false
/// counterparts.
fn parse_bool(input: &str) -> Option<bool> {
    match input {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Base-10 integer parse that also honors `0x`/`0o`/`0b` prefixes.
fn parse_int(input: &str) -> Option<i64> {
    let (negative, rest) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };
    let magnitude = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(oct) = rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0O")) {
        i64::from_str_radix(oct, 8).ok()?
    } else if let Some(bin) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()?
    } else {
        rest.parse::<i64>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Collect one value per descriptor, then validate the complete set.
pub fn collect_parameters(plan: &Plan, prompt: &mut dyn Prompt) -> Result<Parameters> {
    let mut params = Parameters::new();
    for param in &plan.parameters {
        let value = collect_one(param, prompt)?;
        params.insert(param.name.clone(), value);
    }

    let plan_schema = schema::plan_schema(plan)?;
    schema::validate(&plan_schema, &params)?;

    debug!(count = params.len(), plan = %plan.name, "collected parameters");
    Ok(params)
}

fn collect_one(param: &ParameterDescriptor, prompt: &mut dyn Prompt) -> Result<JsonValue> {
    let question = question_for(param);

    for _ in 0..MAX_PROMPT_ATTEMPTS {
        let raw = if param.is_secret() {
            prompt.secret(&question)?
        } else {
            prompt.text(&question)?
        };
        let mut input = raw.trim().to_string();

        if input.is_empty()
            && let Some(default) = &param.default
        {
            input = default.render();
        }
        if param.required && input.is_empty() {
            println!("Parameter [{}] is required. Please try again.", param.name);
            continue;
        }

        if !param.enumeration.is_empty() && !param.enumeration.iter().any(|v| v == &input) {
            println!(
                "[{input}] is not a valid option. Available options: {:?}",
                param.enumeration
            );
            continue;
        }

        match coerce(&input, &param.param_type) {
            Ok(value) => return Ok(value),
            Err(err) => {
                println!("Error accepting input: {err}");
                println!("Please try again");
            }
        }
    }
    Err(anyhow!(
        "no valid input for parameter [{}] after {MAX_PROMPT_ATTEMPTS} attempts",
        param.name
    ))
}

fn question_for(param: &ParameterDescriptor) -> String {
    let description = if param.description.is_empty() {
        String::new()
    } else {
        format!(" ({})", param.description)
    };
    match &param.default {
        Some(default) => format!(
            "Enter value for parameter [{}]{description}, default: [{default}]: ",
            param.name
        ),
        None => format!("Enter value for parameter [{}]{description}: ", param.name),
    }
}
