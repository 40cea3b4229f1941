use std::sync::Arc;

use axum::body::Bytes;
use serde_json::{Map, Value};

use crate::error::{DispatchError, HandlerConfigurationError};
use crate::http::{Request, Token, UploadedFile};

/// A bound argument value, produced by the binder and consumed by handler glue.
#[derive(Debug, Clone)]
pub enum ArgValue {
    Null,
    Request(Arc<Request>),
    Token(Token),
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Bytes(Bytes),
    Array(Vec<Value>),
    Map(Map<String, Value>),
    File(UploadedFile),
}

impl ArgValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ArgValue::Null => "null",
            ArgValue::Request(_) => "request",
            ArgValue::Token(_) => "token",
            ArgValue::Int(_) => "int",
            ArgValue::Float(_) => "float",
            ArgValue::Bool(_) => "bool",
            ArgValue::Str(_) => "string",
            ArgValue::Bytes(_) => "bytes",
            ArgValue::Array(_) => "array",
            ArgValue::Map(_) => "map",
            ArgValue::File(_) => "file",
        }
    }
}

/// Conversion of a bound value into a concrete handler parameter type.
///
/// On mismatch the value is handed back so the caller can report its kind.
pub trait FromArgument: Sized {
    fn from_argument(value: ArgValue) -> Result<Self, ArgValue>;
}

/// Integers are bound as `i64`. Narrower targets saturate, so the `i64::MIN`
/// sentinel lands on the target's own minimum.
macro_rules! from_int_argument {
    ($($ty:ty),*) => {
        $(
            impl FromArgument for $ty {
                fn from_argument(value: ArgValue) -> Result<Self, ArgValue> {
                    match value {
                        ArgValue::Int(n) => Ok(<$ty>::try_from(n).unwrap_or(if n < 0 {
                            <$ty>::MIN
                        } else {
                            <$ty>::MAX
                        })),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

from_int_argument!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl FromArgument for f64 {
    fn from_argument(value: ArgValue) -> Result<Self, ArgValue> {
        match value {
            ArgValue::Float(f) => Ok(f),
            ArgValue::Int(n) => Ok(n as f64),
            other => Err(other),
        }
    }
}

impl FromArgument for f32 {
    fn from_argument(value: ArgValue) -> Result<Self, ArgValue> {
        f64::from_argument(value).map(|f| f as f32)
    }
}

impl FromArgument for bool {
    fn from_argument(value: ArgValue) -> Result<Self, ArgValue> {
        match value {
            ArgValue::Bool(b) => Ok(b),
            other => Err(other),
        }
    }
}

impl FromArgument for String {
    fn from_argument(value: ArgValue) -> Result<Self, ArgValue> {
        match value {
            ArgValue::Str(s) => Ok(s),
            ArgValue::Bytes(b) => Ok(String::from_utf8_lossy(&b).into_owned()),
            other => Err(other),
        }
    }
}

impl FromArgument for Bytes {
    fn from_argument(value: ArgValue) -> Result<Self, ArgValue> {
        match value {
            ArgValue::Bytes(b) => Ok(b),
            ArgValue::Str(s) => Ok(Bytes::from(s)),
            other => Err(other),
        }
    }
}

impl FromArgument for Vec<u8> {
    fn from_argument(value: ArgValue) -> Result<Self, ArgValue> {
        Bytes::from_argument(value).map(|b| b.to_vec())
    }
}

impl FromArgument for Vec<Value> {
    fn from_argument(value: ArgValue) -> Result<Self, ArgValue> {
        match value {
            ArgValue::Array(items) => Ok(items),
            other => Err(other),
        }
    }
}

impl FromArgument for Map<String, Value> {
    fn from_argument(value: ArgValue) -> Result<Self, ArgValue> {
        match value {
            ArgValue::Map(map) => Ok(map),
            other => Err(other),
        }
    }
}

impl FromArgument for Value {
    fn from_argument(value: ArgValue) -> Result<Self, ArgValue> {
        match value {
            ArgValue::Null => Ok(Value::Null),
            ArgValue::Int(n) => Ok(Value::from(n)),
            ArgValue::Float(f) => Ok(Value::from(f)),
            ArgValue::Bool(b) => Ok(Value::Bool(b)),
            ArgValue::Str(s) => Ok(Value::String(s)),
            ArgValue::Array(items) => Ok(Value::Array(items)),
            ArgValue::Map(map) => Ok(Value::Object(map)),
            other => Err(other),
        }
    }
}

impl FromArgument for Arc<Request> {
    fn from_argument(value: ArgValue) -> Result<Self, ArgValue> {
        match value {
            ArgValue::Request(req) => Ok(req),
            other => Err(other),
        }
    }
}

impl FromArgument for Token {
    fn from_argument(value: ArgValue) -> Result<Self, ArgValue> {
        match value {
            ArgValue::Token(token) => Ok(token),
            other => Err(other),
        }
    }
}

impl FromArgument for UploadedFile {
    fn from_argument(value: ArgValue) -> Result<Self, ArgValue> {
        match value {
            ArgValue::File(file) => Ok(file),
            other => Err(other),
        }
    }
}

impl<T: FromArgument> FromArgument for Option<T> {
    fn from_argument(value: ArgValue) -> Result<Self, ArgValue> {
        match value {
            ArgValue::Null => Ok(None),
            other => T::from_argument(other).map(Some),
        }
    }
}

/// Positional arguments bound for one handler invocation.
#[derive(Debug)]
pub struct Arguments {
    handler_id: String,
    values: Vec<Option<ArgValue>>,
}

impl Arguments {
    pub fn new(handler_id: impl Into<String>, values: Vec<ArgValue>) -> Self {
        Self {
            handler_id: handler_id.into(),
            values: values.into_iter().map(Some).collect(),
        }
    }

    pub fn handler_id(&self) -> &str {
        &self.handler_id
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Moves the argument at `index` out, converted to the parameter type.
    pub fn take<T: FromArgument>(&mut self, index: usize) -> Result<T, DispatchError> {
        let value = self
            .values
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| HandlerConfigurationError::ArgumentMissing {
                handler: self.handler_id.clone(),
                index,
            })?;
        T::from_argument(value).map_err(|found| {
            HandlerConfigurationError::ArgumentMismatch {
                handler: self.handler_id.clone(),
                index,
                expected: std::any::type_name::<T>(),
                found: found.kind(),
            }
            .into()
        })
    }
}
