//! Request validation.
//!
//! Raw JSON bodies are walked against static schema tables ([`FieldSpec`])
//! and every problem is collected into a [`ValidationErrors`] value. Typed
//! domain values are only produced from input that passed the walk.

pub mod requests;
pub mod schemas;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use requests::{
    validate_event_batch, validate_finalize, validate_judge_output, validate_seq_monotonic,
    validate_trace_create, MAX_BATCH_EVENTS,
};

/// One problem found in a request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path to the offending field, e.g. `events.0.payload.file_path`.
    pub field: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value,
        }
    }
}

/// Accumulated field errors for one request.
#[derive(Debug, Clone, Default, PartialEq, Error)]
#[error("{} validation error(s)", .0.len())]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// `Ok(value)` when nothing was recorded, otherwise `Err(self)`.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    pub fn to_response_body(&self) -> Value {
        serde_json::json!({
            "detail": "Validation failed",
            "errors": self.0,
        })
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self(vec![error])
    }
}

/// Expected JSON shape of one field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Str,
    Int { min: Option<i64> },
    Float { min: f64, max: f64 },
    Bool,
    OneOf(&'static [&'static str]),
    StrList,
    OneOfList(&'static [&'static str]),
    /// Exactly two integers, e.g. a `[line, column]` position.
    IntPair,
    Object(&'static [FieldSpec]),
    /// Any JSON object; contents are not inspected.
    AnyObject,
}

/// One entry in a schema table.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    /// Optional fields may be absent or `null`.
    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

pub(crate) fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Check `value` is an object matching `specs`, recording problems under `path`.
///
/// Keys not named in `specs` are ignored.
pub fn check_object(value: &Value, specs: &[FieldSpec], path: &str, errors: &mut ValidationErrors) {
    let Some(object) = value.as_object() else {
        errors.push(FieldError::new(
            path,
            "Input should be a valid dictionary",
            Some(value.clone()),
        ));
        return;
    };
    check_fields(object, specs, path, errors);
}

fn check_fields(
    object: &Map<String, Value>,
    specs: &[FieldSpec],
    path: &str,
    errors: &mut ValidationErrors,
) {
    for spec in specs {
        let field_path = join_path(path, spec.name);
        match object.get(spec.name) {
            None => {
                if spec.required {
                    errors.push(FieldError::new(field_path, "Field required", None));
                }
            }
            Some(Value::Null) if !spec.required => {}
            Some(value) => check_value(value, spec.kind, &field_path, errors),
        }
    }
}

fn check_value(value: &Value, kind: FieldKind, path: &str, errors: &mut ValidationErrors) {
    let mut fail = |message: String| {
        errors.push(FieldError::new(path, message, Some(value.clone())));
    };

    match kind {
        FieldKind::Str => {
            if !value.is_string() {
                fail("Input should be a valid string".to_string());
            }
        }
        FieldKind::Int { min } => match value.as_i64() {
            None => fail("Input should be a valid integer".to_string()),
            Some(n) => {
                if let Some(min) = min {
                    if n < min {
                        fail(format!("Input should be greater than or equal to {min}"));
                    }
                }
            }
        },
        FieldKind::Float { min, max } => match value.as_f64() {
            None => fail("Input should be a valid number".to_string()),
            Some(n) if n < min => fail(format!("Input should be greater than or equal to {min}")),
            Some(n) if n > max => fail(format!("Input should be less than or equal to {max}")),
            Some(_) => {}
        },
        FieldKind::Bool => {
            if !value.is_boolean() {
                fail("Input should be a valid boolean".to_string());
            }
        }
        FieldKind::OneOf(allowed) => {
            if !value.as_str().is_some_and(|s| allowed.contains(&s)) {
                fail(format!("Input should be {}", describe_choices(allowed)));
            }
        }
        FieldKind::StrList => check_list(value, path, errors, |item, item_path, errors| {
            check_value(item, FieldKind::Str, item_path, errors);
        }),
        FieldKind::OneOfList(allowed) => check_list(value, path, errors, |item, item_path, errors| {
            check_value(item, FieldKind::OneOf(allowed), item_path, errors);
        }),
        FieldKind::IntPair => match value.as_array() {
            None => fail("Input should be a valid list".to_string()),
            Some(items) if items.len() != 2 => {
                fail(format!("List should have exactly 2 items, not {}", items.len()));
            }
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    check_value(item, FieldKind::Int { min: None }, &join_path(path, &i.to_string()), errors);
                }
            }
        },
        FieldKind::Object(specs) => check_object(value, specs, path, errors),
        FieldKind::AnyObject => {
            if !value.is_object() {
                fail("Input should be a valid dictionary".to_string());
            }
        }
    }
}

fn check_list(
    value: &Value,
    path: &str,
    errors: &mut ValidationErrors,
    check_item: impl Fn(&Value, &str, &mut ValidationErrors),
) {
    let Some(items) = value.as_array() else {
        errors.push(FieldError::new(path, "Input should be a valid list", Some(value.clone())));
        return;
    };
    for (i, item) in items.iter().enumerate() {
        check_item(item, &join_path(path, &i.to_string()), errors);
    }
}

/// `'a', 'b' or 'c'`
fn describe_choices(allowed: &[&str]) -> String {
    let quoted: Vec<String> = allowed.iter().map(|s| format!("'{s}'")).collect();
    match quoted.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {last}", rest.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const INNER: &[FieldSpec] = &[FieldSpec::required("name", FieldKind::Str)];
    const SPECS: &[FieldSpec] = &[
        FieldSpec::required("title", FieldKind::Str),
        FieldSpec::required("count", FieldKind::Int { min: Some(1) }),
        FieldSpec::optional("score", FieldKind::Float { min: 0.0, max: 5.0 }),
        FieldSpec::optional("kind", FieldKind::OneOf(&["a", "b", "c"])),
        FieldSpec::optional("tags", FieldKind::StrList),
        FieldSpec::optional("pos", FieldKind::IntPair),
        FieldSpec::optional("inner", FieldKind::Object(INNER)),
    ];

    fn check(value: Value) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        check_object(&value, SPECS, "", &mut errors);
        errors
    }

    #[test]
    fn test_valid_object_passes() {
        let errors = check(json!({
            "title": "t", "count": 2, "score": 4.5, "kind": "b",
            "tags": ["x"], "pos": [1, 2], "inner": {"name": "n"}, "extra": true
        }));
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_missing_and_mistyped_fields_accumulate() {
        let errors = check(json!({"count": "two", "tags": ["ok", 3]}));
        let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "count", "tags.1"]);
        assert_eq!(errors.errors()[0].message, "Field required");
        assert!(errors.errors()[0].value.is_none());
        assert_eq!(errors.errors()[1].value, Some(json!("two")));
    }

    #[test]
    fn test_bounds_and_choices() {
        let errors = check(json!({"title": "t", "count": 0, "score": 7.0, "kind": "z"}));
        let messages: Vec<&str> = errors.errors().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Input should be greater than or equal to 1",
                "Input should be less than or equal to 5",
                "Input should be 'a', 'b' or 'c'",
            ]
        );
    }

    #[test]
    fn test_nested_paths() {
        let errors = check(json!({"title": "t", "count": 1, "pos": [1], "inner": {}}));
        let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["pos", "inner.name"]);
    }

    #[test]
    fn test_null_optional_is_accepted_but_null_required_is_not() {
        let errors = check(json!({"title": null, "count": 1, "score": null}));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.errors()[0].field, "title");
        assert_eq!(errors.errors()[0].message, "Input should be a valid string");
    }

    #[test]
    fn test_non_object_root() {
        let errors = check(json!([1, 2]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.errors()[0].message, "Input should be a valid dictionary");
    }

    #[test]
    fn test_describe_choices() {
        assert_eq!(describe_choices(&["x"]), "'x'");
        assert_eq!(describe_choices(&["x", "y"]), "'x' or 'y'");
    }
}
