use crate::domain::model::{Record, ValidationOutcome};
use serde_json::Value;

pub const REQUIRED_FIELDS: [&str; 3] = ["id", "name", "value"];

/// Schema check with the rejection reason.
pub fn check(record: &Record) -> ValidationOutcome {
    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !record.has(f)) {
        return ValidationOutcome::rejected(format!("missing field '{}'", missing));
    }

    match record.get("value").and_then(as_number) {
        Some(_) => ValidationOutcome::ok(),
        None => ValidationOutcome::rejected(format!(
            "field 'value' is not numeric: {}",
            display_value(record.get("value"))
        )),
    }
}

pub fn validate(record: &Record) -> bool {
    check(record).valid
}

/// Normalizes a validated record: trimmed title-case `name`, float `value`,
/// and `processed = true`. Other fields are carried over unchanged.
pub fn transform(record: &Record) -> Record {
    let mut processed = record.clone();

    if let Some(name) = record.get("name") {
        let name = match name {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        processed
            .data
            .insert("name".to_string(), Value::String(title_case(name.trim())));
    }

    if let Some(value) = record.get("value").and_then(as_number) {
        processed.data.insert("value".to_string(), Value::from(value));
    }

    processed
        .data
        .insert("processed".to_string(), Value::Bool(true));
    processed
}

fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Upper-cases the first letter of every alphabetic run, lower-cases the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => format!("\"{}\"", s),
        Some(v) => v.to_string(),
        None => "null".to_string(),
    }
}
