//! Constraint tables and the validator that enforces them.
//!
//! Each resource declares a static `&[FieldRule]`. Validation runs before
//! any adapter call, strips fields the table does not name, normalizes
//! integer strings coming from multipart forms into numbers, and collects
//! every violation into a per-field message list.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::storage::Upload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text { max: usize },
    Integer { min: i64 },
    OneOf(&'static [&'static str]),
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldRule {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    /// May be absent or null.
    pub const fn nullable(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Create checks every rule; update only checks the fields that were sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRule {
    pub max_kilobytes: usize,
    pub content_types: &'static [&'static str],
}

impl ImageRule {
    pub const STANDARD: ImageRule = ImageRule {
        max_kilobytes: 2048,
        content_types: &[
            "image/jpeg",
            "image/png",
            "image/gif",
            "image/webp",
            "image/bmp",
            "image/svg+xml",
        ],
    };
}

/// Field name to messages, serialized as `{"age": ["..."]}`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

/// Human label for messages: `gamesPlayed` -> `games played`.
fn label(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for ch in field.chars() {
        if ch == '_' {
            out.push(' ');
        } else if ch.is_ascii_uppercase() {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn parses_as_date(s: &str) -> bool {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
        || DateTime::parse_from_rfc3339(s).is_ok()
}

/// Check `value` against `kind`, returning the normalized value.
fn check(field: &str, kind: FieldKind, value: &Value) -> Result<Value, String> {
    let label = label(field);
    match kind {
        FieldKind::Text { max } => match value {
            Value::String(s) if s.chars().count() > max => Err(format!(
                "The {label} field must not be greater than {max} characters."
            )),
            Value::String(s) => Ok(Value::String(s.clone())),
            _ => Err(format!("The {label} field must be a string.")),
        },
        FieldKind::Integer { min } => {
            let parsed = match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            match parsed {
                None => Err(format!("The {label} field must be an integer.")),
                Some(n) if n < min => Err(format!("The {label} field must be at least {min}.")),
                Some(n) => Ok(Value::from(n)),
            }
        }
        FieldKind::OneOf(allowed) => match value {
            Value::String(s) if allowed.contains(&s.as_str()) => Ok(Value::String(s.clone())),
            _ => Err(format!("The selected {label} is invalid.")),
        },
        FieldKind::Date => match value {
            Value::String(s) if parses_as_date(s) => Ok(Value::String(s.trim().to_string())),
            _ => Err(format!("The {label} field must be a valid date.")),
        },
    }
}

/// Validate `fields` in place against `rules`.
pub fn validate(
    rules: &[FieldRule],
    fields: &mut Map<String, Value>,
    mode: Mode,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    fields.retain(|name, _| rules.iter().any(|rule| rule.name == name));

    for rule in rules {
        let value = fields.get(rule.name).cloned();
        match value {
            None if mode == Mode::Update => {}
            None | Some(Value::Null) if !rule.required => {
                fields.insert(rule.name.to_string(), Value::Null);
            }
            Some(ref v) if is_blank(v) && !rule.required => {
                fields.insert(rule.name.to_string(), Value::Null);
            }
            None => errors.add(rule.name, format!("The {} field is required.", label(rule.name))),
            Some(ref v) if is_blank(v) => {
                errors.add(rule.name, format!("The {} field is required.", label(rule.name)))
            }
            Some(v) => match check(rule.name, rule.kind, &v) {
                Ok(normalized) => {
                    fields.insert(rule.name.to_string(), normalized);
                }
                Err(message) => errors.add(rule.name, message),
            },
        }
    }

    errors.into_result()
}

/// Check one uploaded file, recording violations under `field`.
pub fn validate_image(field: &str, rule: &ImageRule, upload: &Upload, errors: &mut FieldErrors) {
    let label = label(field);
    let content_type = upload.content_type.to_ascii_lowercase();
    if !rule.content_types.contains(&content_type.as_str()) {
        errors.add(field, format!("The {label} field must be an image."));
    }
    if upload.content.len() > rule.max_kilobytes * 1024 {
        errors.add(
            field,
            format!(
                "The {label} field must not be greater than {} kilobytes.",
                rule.max_kilobytes
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    const RULES: &[FieldRule] = &[
        FieldRule::required("name", FieldKind::Text { max: 5 }),
        FieldRule::required("age", FieldKind::Integer { min: 0 }),
        FieldRule::required("status", FieldKind::OneOf(&["Active", "Inactive"])),
        FieldRule::nullable("match_date", FieldKind::Date),
    ];

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn create_reports_every_violation() {
        let mut input = fields(json!({"name": "too long", "age": -1, "status": "Retired"}));
        let errors = validate(RULES, &mut input, Mode::Create).unwrap_err();

        assert_eq!(
            errors.get("name").unwrap(),
            ["The name field must not be greater than 5 characters."]
        );
        assert_eq!(errors.get("age").unwrap(), ["The age field must be at least 0."]);
        assert_eq!(errors.get("status").unwrap(), ["The selected status is invalid."]);
        assert!(errors.get("match_date").is_none());
    }

    #[test]
    fn create_requires_missing_fields() {
        let mut input = fields(json!({"name": "Jo"}));
        let errors = validate(RULES, &mut input, Mode::Create).unwrap_err();
        assert_eq!(errors.get("age").unwrap(), ["The age field is required."]);
    }

    #[test]
    fn integer_strings_are_normalized_and_unknown_fields_dropped() {
        let mut input = fields(json!({"name": "Jo", "age": "24", "status": "Active", "admin": true}));
        validate(RULES, &mut input, Mode::Create).unwrap();

        assert_eq!(input["age"], json!(24));
        assert_eq!(input["match_date"], Value::Null);
        assert!(!input.contains_key("admin"));
    }

    #[test]
    fn update_only_checks_present_fields() {
        let mut input = fields(json!({"age": 30}));
        validate(RULES, &mut input, Mode::Update).unwrap();
        assert_eq!(input, fields(json!({"age": 30})));
    }

    #[test]
    fn update_rejects_blank_required_field() {
        let mut input = fields(json!({"name": ""}));
        let errors = validate(RULES, &mut input, Mode::Update).unwrap_err();
        assert_eq!(errors.get("name").unwrap(), ["The name field is required."]);
    }

    #[test]
    fn dates_accept_common_formats() {
        for date in ["2025-04-02", "2025-04-02 08:10:07", "2025-04-02T08:10:07Z"] {
            let mut input = fields(json!({"match_date": date}));
            validate(RULES, &mut input, Mode::Update).unwrap();
        }
        let mut input = fields(json!({"match_date": "yesterday"}));
        let errors = validate(RULES, &mut input, Mode::Update).unwrap_err();
        assert_eq!(errors.get("match_date").unwrap(), ["The match date field must be a valid date."]);
    }

    #[test]
    fn labels_split_camel_case() {
        assert_eq!(label("gamesPlayed"), "games played");
        assert_eq!(label("match_date"), "match date");
    }

    #[test]
    fn oversized_and_non_image_uploads_fail() {
        let upload = Upload {
            file_name: Some("notes.txt".into()),
            content_type: "text/plain".into(),
            content: Bytes::from(vec![0_u8; 3 * 1024 * 1024]),
        };
        let mut errors = FieldErrors::new();
        validate_image("image", &ImageRule::STANDARD, &upload, &mut errors);
        assert_eq!(errors.get("image").unwrap().len(), 2);
    }
}
