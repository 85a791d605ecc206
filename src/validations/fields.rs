use std::{collections::HashMap, fmt};

use actix_web::http::header::HeaderMap;
use serde_json::{Map, Value};

use crate::errors::ApiError;

/// JSON object carried by a request body
pub type JsonBody = Map<String, Value>;

/// Declared semantic type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    // Part of the coercion table; no invite field is numeric yet
    #[allow(dead_code)]
    Integer,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "string"),
            FieldType::Integer => write!(f, "integer"),
        }
    }
}

type Coercion = fn(&Value) -> Option<FieldValue>;

impl FieldType {
    /// Coercion function for this type; `None` from the coercion means `bad_type`
    fn coercion(self) -> Coercion {
        match self {
            FieldType::Text => coerce_text,
            FieldType::Integer => coerce_integer,
        }
    }
}

fn coerce_text(value: &Value) -> Option<FieldValue> {
    match value {
        Value::String(s) => Some(FieldValue::Text(s.clone())),
        Value::Number(n) => Some(FieldValue::Text(n.to_string())),
        Value::Bool(true) => Some(FieldValue::Text("True".to_string())),
        Value::Bool(false) => Some(FieldValue::Text("False".to_string())),
        _ => None,
    }
}

fn coerce_integer(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Number(n) => n.as_i64().map(FieldValue::Integer),
        Value::String(s) => s.trim().parse().ok().map(FieldValue::Integer),
        _ => None,
    }
}

/// A value that passed its field's checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
}

impl FieldValue {
    fn rendered(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Integer(i) => i.to_string(),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            FieldValue::Text(s) => s,
            FieldValue::Integer(i) => i.to_string(),
        }
    }
}

/// Printable ASCII: letters, digits, punctuation and whitespace
pub fn is_printable(c: char) -> bool {
    c.is_ascii_graphic() || matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

/// JSON values that count as "not given"
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Constraints for one named request field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub min: usize,
    pub max: usize,
    pub field_type: FieldType,
    pub required: bool,
    pub printable: bool,
}

impl FieldSpec {
    /// Required printable text between 1 and 4096 characters
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            min: 1,
            max: 4096,
            field_type: FieldType::Text,
            required: true,
            printable: true,
        }
    }

    pub const fn length(mut self, min: usize, max: usize) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    #[allow(dead_code)]
    pub const fn of_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    #[allow(dead_code)]
    pub const fn allow_unprintable(mut self) -> Self {
        self.printable = false;
        self
    }

    /// Body-field flavour: reads `name` from the JSON body
    pub fn check_body(&self, body: Option<&JsonBody>) -> Result<Option<FieldValue>, ApiError> {
        let Some(body) = body else {
            return if self.required {
                Err(ApiError::BadRequest)
            } else {
                Ok(None)
            };
        };

        self.check_raw(body.get(self.name))
    }

    /// Header-field flavour: reads `name` from the request headers
    pub fn check_header(&self, headers: &HeaderMap) -> Result<Option<FieldValue>, ApiError> {
        let raw = match headers.get(self.name) {
            Some(value) => {
                let value = value.to_str().map_err(|_| ApiError::NotPrintable(self.name))?;
                Some(Value::String(value.to_string()))
            }
            None => None,
        };

        self.check_raw(raw.as_ref())
    }

    /// Checks a single loose value, e.g. a path segment
    pub fn check_str(&self, value: &str) -> Result<Option<FieldValue>, ApiError> {
        self.check_raw(Some(&Value::String(value.to_string())))
    }

    fn check_raw(&self, raw: Option<&Value>) -> Result<Option<FieldValue>, ApiError> {
        let value = match raw {
            Some(value) if !is_blank(value) => value,
            _ if self.required => return Err(ApiError::Unspecified(self.name)),
            _ => return Ok(None),
        };

        let coerced = (self.field_type.coercion())(value).ok_or(ApiError::BadType {
            field: self.name,
            expected: self.field_type,
        })?;

        let rendered = coerced.rendered();
        let length = rendered.chars().count();
        if length < self.min || length > self.max {
            return Err(ApiError::OutOfRange {
                field: self.name,
                min: self.min,
                max: self.max,
            });
        }

        if self.printable
            && self.field_type == FieldType::Text
            && !rendered.chars().all(is_printable)
        {
            return Err(ApiError::NotPrintable(self.name));
        }

        Ok(Some(coerced))
    }
}

/// Values bound by a set of field specs, keyed by field name
#[derive(Debug, Default)]
pub struct ValidatedFields {
    values: HashMap<&'static str, FieldValue>,
}

impl ValidatedFields {
    pub fn take_text(&mut self, name: &'static str) -> Option<String> {
        self.values.remove(name).map(FieldValue::into_text)
    }

    /// Same as `take_text` but for fields declared as required
    pub fn require_text(&mut self, name: &'static str) -> Result<String, ApiError> {
        self.take_text(name).ok_or(ApiError::Unspecified(name))
    }
}

/// Parses a request body into a JSON object. Empty, malformed and non-object
/// bodies, as well as `{}`, count as no body at all.
pub fn parse_json_body(bytes: &[u8]) -> Option<JsonBody> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) if !map.is_empty() => Some(map),
        _ => None,
    }
}

/// Runs every spec in order against the body, stopping at the first failure
pub fn validate_body(specs: &[FieldSpec], body: Option<&JsonBody>) -> Result<ValidatedFields, ApiError> {
    let mut fields = ValidatedFields::default();
    for spec in specs {
        if let Some(value) = spec.check_body(body)? {
            fields.values.insert(spec.name, value);
        }
    }
    Ok(fields)
}

/// Runs every spec in order against the request headers
pub fn validate_headers(specs: &[FieldSpec], headers: &HeaderMap) -> Result<ValidatedFields, ApiError> {
    let mut fields = ValidatedFields::default();
    for spec in specs {
        if let Some(value) = spec.check_header(headers)? {
            fields.values.insert(spec.name, value);
        }
    }
    Ok(fields)
}
