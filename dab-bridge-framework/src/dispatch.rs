//! Parameter extraction for operation dispatch.
//!
//! An incoming envelope carries operation parameters either under
//! `payload` or at the top level; `payload` wins when both are present.
//! Each operation declares an ordered list of fixed parameter names that
//! must resolve, and optional names that default when absent. The
//! reserved name `"*"` injects the whole envelope instead of a field.

use dab_common::{DabError, JsonError, Result, Value};

/// Resolve the declared parameters of an operation against an envelope,
/// in declaration order. Missing fixed parameters fail with
/// `400 missing parameter "<name>"`; missing optional parameters resolve
/// to `Null` and take their zero default during coercion.
pub fn extract_args(
    envelope: &Value,
    fixed: &[&str],
    optional: &[&str],
) -> Result<Vec<Value>> {
    let mut args = Vec::with_capacity(fixed.len() + optional.len());
    for name in fixed {
        if *name == "*" {
            args.push(envelope.clone());
            continue;
        }
        match lookup(envelope, name) {
            Some(value) => args.push(value.clone()),
            None => {
                return Err(DabError::bad_request(format!(
                    "missing parameter \"{name}\""
                )));
            }
        }
    }
    for name in optional {
        match lookup(envelope, name) {
            Some(value) => args.push(value.clone()),
            None => args.push(Value::Null),
        }
    }
    Ok(args)
}

fn lookup<'a>(envelope: &'a Value, name: &str) -> Option<&'a Value> {
    if let Ok(payload) = envelope.get("payload") {
        if payload.has(name) {
            return payload.get(name).ok();
        }
    }
    if envelope.has(name) {
        return envelope.get(name).ok();
    }
    None
}

/// Bind a parameter slot declared as a string. `Null` takes the empty
/// default; any other non-string variant is a caller error.
pub fn arg_string(value: Value) -> Result<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        _ => Err(JsonError::InvalidValue("string").into()),
    }
}

/// Bind a parameter slot declared as an integer.
pub fn arg_i64(value: Value) -> Result<i64> {
    match value {
        Value::Null => Ok(0),
        Value::Integer(n) => Ok(n),
        _ => Err(JsonError::InvalidValue("integer").into()),
    }
}

/// Bind a parameter slot declared as a boolean.
pub fn arg_bool(value: Value) -> Result<bool> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        _ => Err(JsonError::InvalidValue("boolean").into()),
    }
}
