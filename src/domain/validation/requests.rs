//! Validation entry points for each request shape.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::schemas::{self, payload_schema};
use super::{check_object, FieldError, FieldSpec, ValidationErrors};
use crate::domain::models::qa::round_score;
use crate::domain::models::{Event, EventType, FinalizeRequest, JudgeOutput, TraceCreate};

/// Largest number of events accepted in one batch.
pub const MAX_BATCH_EVENTS: usize = 100;

fn check_body(body: &Value, specs: &[FieldSpec], errors: &mut ValidationErrors) {
    if body.is_object() {
        check_object(body, specs, "", errors);
    } else {
        errors.push(FieldError::new(
            "body",
            "Input should be a valid dictionary",
            Some(body.clone()),
        ));
    }
}

/// Deserialize input that already passed its schema walk.
fn parse_checked<T: DeserializeOwned>(value: &Value, path: &str) -> Result<T, ValidationErrors> {
    serde_json::from_value(value.clone())
        .map_err(|e| FieldError::new(path, e.to_string(), None).into())
}

/// Validate a trace-creation body.
pub fn validate_trace_create(body: &Value) -> Result<TraceCreate, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_body(body, schemas::TRACE_CREATE, &mut errors);
    errors.into_result(())?;
    parse_checked(body, "body")
}

/// Validate a finalize body.
pub fn validate_finalize(body: &Value) -> Result<FinalizeRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_body(body, schemas::FINALIZE, &mut errors);
    errors.into_result(())?;
    parse_checked(body, "body")
}

/// Validate an event batch body in two phases.
///
/// The envelope of every event is checked first; any envelope error rejects
/// the batch. Payloads are then checked against the schema for their type,
/// with errors from all events reported together.
pub fn validate_event_batch(body: &Value) -> Result<Vec<Event>, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let Some(object) = body.as_object() else {
        check_body(body, &[], &mut errors);
        return Err(errors);
    };
    let items = match object.get("events") {
        None => {
            errors.push(FieldError::new("events", "Field required", None));
            return Err(errors);
        }
        Some(Value::Array(items)) => items,
        Some(other) => {
            errors.push(FieldError::new(
                "events",
                "Input should be a valid list",
                Some(other.clone()),
            ));
            return Err(errors);
        }
    };

    if items.is_empty() {
        errors.push(FieldError::new(
            "events",
            "List should have at least 1 item after validation, not 0",
            None,
        ));
    } else if items.len() > MAX_BATCH_EVENTS {
        errors.push(FieldError::new(
            "events",
            format!(
                "List should have at most {MAX_BATCH_EVENTS} items after validation, not {}",
                items.len()
            ),
            None,
        ));
    }

    for (i, raw) in items.iter().enumerate() {
        check_object(raw, schemas::EVENT_ENVELOPE, &format!("events.{i}"), &mut errors);
    }
    errors.into_result(())?;

    let mut errors = ValidationErrors::new();
    for (i, raw) in items.iter().enumerate() {
        let event_type = raw["type"].as_str().and_then(EventType::from_str);
        if let Some(event_type) = event_type {
            check_object(
                &raw["payload"],
                payload_schema(event_type),
                &format!("events.{i}.payload"),
                &mut errors,
            );
        }
    }
    errors.into_result(())?;

    items
        .iter()
        .enumerate()
        .map(|(i, raw)| parse_checked(raw, &format!("events.{i}")))
        .collect()
}

/// Require every seq to exceed both `current_high` and the previous seq in the batch.
///
/// One error is recorded per offending event.
pub fn validate_seq_monotonic(events: &[Event], current_high: u64) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut prev = current_high;
    for (i, event) in events.iter().enumerate() {
        if event.seq <= prev {
            errors.push(FieldError::new(
                format!("events.{i}.seq"),
                format!(
                    "seq must be > {prev} (monotonically increasing), got {}",
                    event.seq
                ),
                Some(Value::from(event.seq)),
            ));
        }
        prev = event.seq;
    }
    errors.into_result(())
}

/// Validate the evaluator's JSON answer; `overall` is rounded to one decimal.
pub fn validate_judge_output(value: &Value) -> Result<JudgeOutput, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_body(value, schemas::JUDGE_OUTPUT, &mut errors);
    if value["rationale"].as_str().is_some_and(str::is_empty) {
        errors.push(FieldError::new(
            "rationale",
            "String should have at least 1 character",
            Some(value["rationale"].clone()),
        ));
    }
    errors.into_result(())?;

    let mut output: JudgeOutput = parse_checked(value, "body")?;
    output.overall = round_score(output.overall);
    Ok(output)
}
