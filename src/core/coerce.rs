//! Argument validation and type coercion.
//!
//! Validation collects every violation in an argument set before failing, so a
//! caller sees the full picture in one round trip. Coercion converts raw JSON
//! values into the descriptor's declared types, including recursive
//! construction of composite targets from plain objects.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::core::FlowValue;
use crate::core::descriptor::{
    CompositeSchema, Constraint, FunctionDescriptor, ParameterSpec, ValueType,
};
use crate::core::error::{FlowError, Violation};

/// Checks `raw_args` against the descriptor's parameter specs.
///
/// Fails with an aggregate [`FlowError::ConstraintViolation`] only when at
/// least one violation was collected; otherwise succeeds silently.
pub fn validate(
    descriptor: &FunctionDescriptor,
    raw_args: &HashMap<String, FlowValue>,
) -> Result<(), FlowError> {
    let mut violations = Vec::new();

    for spec in &descriptor.inputs {
        match raw_args.get(&spec.name) {
            None => {
                if spec.required {
                    violations.push(Violation::MissingRequired {
                        parameter: spec.name.clone(),
                    });
                }
            }
            Some(value) => {
                for constraint in &spec.constraints {
                    if let Some(message) = check_constraint(constraint, value) {
                        violations.push(Violation::Constraint {
                            parameter: spec.name.clone(),
                            message,
                        });
                    }
                }
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(FlowError::ConstraintViolation(violations))
    }
}

/// Evaluates one constraint; `Some(message)` describes a failure.
fn check_constraint(constraint: &Constraint, value: &FlowValue) -> Option<String> {
    match constraint {
        Constraint::Min(min) => {
            let number = value.as_f64()?;
            (number < *min).then(|| format!("value {} is below the minimum of {}", number, min))
        }
        Constraint::Max(max) => {
            let number = value.as_f64()?;
            (number > *max).then(|| format!("value {} is above the maximum of {}", number, max))
        }
        Constraint::MinSize(min) => {
            let size = size_of(value)?;
            (size < *min).then(|| format!("size {} is below the minimum size of {}", size, min))
        }
        Constraint::MaxSize(max) => {
            let size = size_of(value)?;
            (size > *max).then(|| format!("size {} is above the maximum size of {}", size, max))
        }
        Constraint::Pattern(pattern) => {
            let text = value.as_str()?;
            match Regex::new(pattern) {
                Ok(re) => (!re.is_match(text))
                    .then(|| format!("value does not match pattern '{}'", pattern)),
                Err(_) => Some(format!("invalid pattern '{}'", pattern)),
            }
        }
        Constraint::Email => {
            let text = value.as_str()?;
            (!email_shape().is_match(text)).then(|| "value is not a valid email".to_string())
        }
    }
}

/// Size constraints apply to strings (character count) and lists.
fn size_of(value: &FlowValue) -> Option<usize> {
    match value {
        FlowValue::String(s) => Some(s.chars().count()),
        FlowValue::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn email_shape() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

/// Converts `value` into the target type.
///
/// Identity when already assignable; primitive parsing for string inputs;
/// recursive schema-driven construction for composite targets. `Null` passes
/// through untouched for every target.
pub fn coerce(value: &FlowValue, target: &ValueType) -> Result<FlowValue, FlowError> {
    if value.is_null() {
        return Ok(FlowValue::Null);
    }

    match target {
        ValueType::Any => Ok(value.clone()),
        ValueType::String => match value {
            FlowValue::String(_) => Ok(value.clone()),
            FlowValue::Number(n) => Ok(FlowValue::String(n.to_string())),
            FlowValue::Bool(b) => Ok(FlowValue::String(b.to_string())),
            _ => Err(coercion_error(value, target)),
        },
        ValueType::Integer => match value {
            FlowValue::Number(n) => {
                let int = n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .ok_or_else(|| coercion_error(value, target))?;
                Ok(FlowValue::from(int))
            }
            FlowValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map(FlowValue::from)
                .map_err(|_| coercion_error(value, target)),
            _ => Err(coercion_error(value, target)),
        },
        ValueType::Float => match value {
            FlowValue::Number(n) => {
                let float = n.as_f64().ok_or_else(|| coercion_error(value, target))?;
                Ok(FlowValue::from(float))
            }
            FlowValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map(FlowValue::from)
                .map_err(|_| coercion_error(value, target)),
            _ => Err(coercion_error(value, target)),
        },
        ValueType::Boolean => match value {
            FlowValue::Bool(_) => Ok(value.clone()),
            FlowValue::String(s) => match s.trim() {
                "true" => Ok(FlowValue::Bool(true)),
                "false" => Ok(FlowValue::Bool(false)),
                _ => Err(coercion_error(value, target)),
            },
            _ => Err(coercion_error(value, target)),
        },
        ValueType::List => match value {
            FlowValue::Array(_) => Ok(value.clone()),
            _ => Err(coercion_error(value, target)),
        },
        ValueType::Object => match value {
            FlowValue::Object(_) => Ok(value.clone()),
            _ => Err(coercion_error(value, target)),
        },
        ValueType::Composite(schema) => match value {
            FlowValue::Object(map) => build_composite(map, schema),
            _ => Err(coercion_error(value, target)),
        },
    }
}

/// Builds a composite target from a generic key-value input.
///
/// Keys match field names; unknown keys are ignored; unmatched fields take
/// their declared default, else the type's zero value. This is a lenient,
/// partial-construction contract: missing optional fields never fail it.
fn build_composite(
    input: &serde_json::Map<String, FlowValue>,
    schema: &CompositeSchema,
) -> Result<FlowValue, FlowError> {
    let mut constructed = serde_json::Map::with_capacity(schema.fields.len());

    for field in &schema.fields {
        let value = match input.get(&field.name) {
            Some(present) => coerce(present, &field.ty)?,
            None => match &field.default {
                Some(default) => coerce(default, &field.ty)?,
                None => zero_value(&field.ty),
            },
        };
        constructed.insert(field.name.clone(), value);
    }

    Ok(FlowValue::Object(constructed))
}

/// The zero value a composite field falls back to when nothing matched it.
fn zero_value(ty: &ValueType) -> FlowValue {
    match ty {
        ValueType::Any => FlowValue::Null,
        ValueType::String => FlowValue::String(String::new()),
        ValueType::Integer => FlowValue::from(0),
        ValueType::Float => FlowValue::from(0.0),
        ValueType::Boolean => FlowValue::Bool(false),
        ValueType::List => FlowValue::Array(Vec::new()),
        ValueType::Object => FlowValue::Object(serde_json::Map::new()),
        ValueType::Composite(schema) => {
            let fields = schema
                .fields
                .iter()
                .map(|f| (f.name.clone(), zero_value(&f.ty)))
                .collect();
            FlowValue::Object(fields)
        }
    }
}

fn coercion_error(value: &FlowValue, target: &ValueType) -> FlowError {
    FlowError::TypeCoercion {
        value: value.to_string(),
        target: target.to_string(),
    }
}

/// Produces the positional argument vector in ParameterSpec order.
///
/// Present arguments are coerced to the declared type; absent optional ones
/// take their coerced default, else `Null`. Required-but-absent parameters are
/// caught by [`validate`] before this runs.
pub fn bind_positional(
    descriptor: &FunctionDescriptor,
    raw_args: &HashMap<String, FlowValue>,
) -> Result<Vec<FlowValue>, FlowError> {
    descriptor
        .inputs
        .iter()
        .map(|spec| bind_one(spec, raw_args.get(&spec.name)))
        .collect()
}

fn bind_one(spec: &ParameterSpec, value: Option<&FlowValue>) -> Result<FlowValue, FlowError> {
    match value {
        Some(present) => coerce(present, &spec.ty),
        None => match &spec.default {
            Some(default) => coerce(default, &spec.ty),
            None => Ok(FlowValue::Null),
        },
    }
}
