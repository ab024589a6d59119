//! Request extractors that report failures in the API's error format.

use std::str::FromStr;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AppError, FieldErrors};

/// Request body types read one field at a time from a JSON object.
pub trait FromFields: Sized {
    fn from_fields(fields: &mut Fields) -> Self;
}

/// A JSON object being converted into a request type. Values of the wrong
/// type are recorded against their field name and read back as absent;
/// `null` counts as absent.
pub struct Fields {
    values: Map<String, Value>,
    errors: FieldErrors,
}

impl Fields {
    pub fn new(values: Map<String, Value>) -> Self {
        Self {
            values,
            errors: FieldErrors::new(),
        }
    }

    fn take(&mut self, field: &str) -> Option<Value> {
        self.values.remove(field).filter(|v| !v.is_null())
    }

    pub fn string(&mut self, field: &str) -> Option<String> {
        match self.take(field)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => {
                self.errors.add(field, "Not a valid string.");
                None
            }
        }
    }

    /// Integers, also as numeric strings such as `"10"`.
    pub fn integer(&mut self, field: &str) -> Option<i32> {
        let parsed = match self.take(field)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        match parsed.and_then(|n| i32::try_from(n).ok()) {
            Some(n) => Some(n),
            None => {
                self.errors.add(field, "A valid integer is required.");
                None
            }
        }
    }

    /// Decimals from strings or JSON numbers.
    pub fn decimal(&mut self, field: &str) -> Option<Decimal> {
        let parsed = match self.take(field)? {
            Value::String(s) => Decimal::from_str(s.trim()).ok(),
            Value::Number(n) => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .ok(),
            _ => None,
        };
        if parsed.is_none() {
            self.errors.add(field, "A valid number is required.");
        }
        parsed
    }

    /// A list of primary keys; every entry that is not a UUID gets its own
    /// message.
    pub fn id_list(&mut self, field: &str) -> Option<Vec<Uuid>> {
        let items = match self.take(field)? {
            Value::Array(items) => items,
            other => {
                self.errors.add(
                    field,
                    format!(
                        "Expected a list of items but got type \"{}\".",
                        type_name(&other)
                    ),
                );
                return None;
            }
        };

        let mut ids = Vec::with_capacity(items.len());
        let mut valid = true;
        for item in items {
            match item.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
                Some(id) => ids.push(id),
                None => {
                    valid = false;
                    let shown = match &item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    self.errors
                        .add(field, format!("Invalid pk \"{shown}\" - object does not exist."));
                }
            }
        }
        valid.then_some(ids)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// JSON body read through [`FromFields`]. Malformed JSON answers 400 with a
/// `detail`; type mismatches answer 400 keyed by field.
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    T: FromFields,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<Value>::from_request(req, state).await?;
        let values = match body {
            Value::Object(values) => values,
            other => {
                return Err(AppError::field(
                    "non_field_errors",
                    format!(
                        "Invalid data. Expected a dictionary, but got {}.",
                        type_name(&other)
                    ),
                ))
            }
        };

        let mut fields = Fields::new(values);
        let value = T::from_fields(&mut fields);
        fields.errors.into_result()?;
        Ok(Payload(value))
    }
}

/// The `:id` path segment. A segment that is not a UUID cannot name any
/// record, so it answers 404 like an unknown id.
#[derive(Debug, Clone, Copy)]
pub struct RecordId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for RecordId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound)?;
        Uuid::parse_str(&raw)
            .map(RecordId)
            .map_err(|_| AppError::NotFound)
    }
}
