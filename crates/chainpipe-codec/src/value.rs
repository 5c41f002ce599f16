//! Decoded values.

use std::fmt;

use alloy_primitives::{I256, U256};
use chainpipe_core::error::DecodeError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A value produced by decoding bytes against a [`Schema`](crate::Schema).
///
/// Integers of every width are widened to 256 bits so callers never deal
/// with overflow; protocol decoders narrow them where the width allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Unit,
    Bool(bool),
    Uint(U256),
    Int(I256),
    Bytes(#[serde(with = "chainpipe_core::serde_hex")] Vec<u8>),
    /// Canonical text form: checksummed hex (EVM) or base58 (Solana).
    Address(String),
    Array(Vec<Value>),
    /// Fields in declaration order.
    Struct(IndexMap<String, Value>),
    Enum { variant: String, value: Box<Value> },
}

impl Value {
    pub fn uint(v: u128) -> Value {
        Value::Uint(U256::from(v))
    }

    pub fn int(v: i128) -> Value {
        let magnitude = I256::from_raw(U256::from(v.unsigned_abs()));
        Value::Int(if v < 0 { -magnitude } else { magnitude })
    }

    pub fn address(s: impl Into<String>) -> Value {
        Value::Address(s.into())
    }

    /// Struct from `(name, value)` pairs.
    pub fn structure<I, S>(fields: I) -> Value
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Value::Struct(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Union variant without payload.
    pub fn variant(name: impl Into<String>) -> Value {
        Value::Enum {
            variant: name.into(),
            value: Box::new(Value::Unit),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Uint(_) => "uint",
            Value::Int(_) => "int",
            Value::Bytes(_) => "bytes",
            Value::Address(_) => "address",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
            Value::Enum { .. } => "enum",
        }
    }

    fn mismatch(&self, expected: &str) -> DecodeError {
        DecodeError::TypeMismatch {
            expected: expected.into(),
            got: self.kind().into(),
        }
    }

    /// Field of a struct value.
    pub fn field(&self, name: &str) -> Result<&Value, DecodeError> {
        match self {
            Value::Struct(fields) => fields.get(name).ok_or_else(|| DecodeError::MissingField {
                field: name.to_string(),
            }),
            other => Err(other.mismatch("struct")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, DecodeError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_uint(&self) -> Result<U256, DecodeError> {
        match self {
            Value::Uint(u) => Ok(*u),
            other => Err(other.mismatch("uint")),
        }
    }

    pub fn as_int(&self) -> Result<I256, DecodeError> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn as_address(&self) -> Result<&str, DecodeError> {
        match self {
            Value::Address(a) => Ok(a.as_str()),
            other => Err(other.mismatch("address")),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], DecodeError> {
        match self {
            Value::Bytes(b) => Ok(b.as_slice()),
            other => Err(other.mismatch("bytes")),
        }
    }

    pub fn as_array(&self) -> Result<&[Value], DecodeError> {
        match self {
            Value::Array(items) => Ok(items.as_slice()),
            other => Err(other.mismatch("array")),
        }
    }

    /// Variant name of a union value.
    pub fn as_variant(&self) -> Result<&str, DecodeError> {
        match self {
            Value::Enum { variant, .. } => Ok(variant.as_str()),
            other => Err(other.mismatch("enum")),
        }
    }

    /// Unsigned integer narrowed to `u128`.
    pub fn to_u128(&self) -> Result<u128, DecodeError> {
        let u = self.as_uint()?;
        u128::try_from(u).map_err(|_| DecodeError::malformed(format!("{u} does not fit in u128")))
    }

    pub fn to_u64(&self) -> Result<u64, DecodeError> {
        let u = self.to_u128()?;
        u64::try_from(u).map_err(|_| DecodeError::malformed(format!("{u} does not fit in u64")))
    }

    pub fn to_u16(&self) -> Result<u16, DecodeError> {
        let u = self.to_u128()?;
        u16::try_from(u).map_err(|_| DecodeError::malformed(format!("{u} does not fit in u16")))
    }

    pub fn to_u8(&self) -> Result<u8, DecodeError> {
        let u = self.to_u128()?;
        u8::try_from(u).map_err(|_| DecodeError::malformed(format!("{u} does not fit in u8")))
    }

    /// Signed integer narrowed to `i128`.
    pub fn to_i128(&self) -> Result<i128, DecodeError> {
        let i = self.as_int()?;
        i128::try_from(i).map_err(|_| DecodeError::malformed(format!("{i} does not fit in i128")))
    }

    pub fn to_i32(&self) -> Result<i32, DecodeError> {
        let i = self.to_i128()?;
        i32::try_from(i).map_err(|_| DecodeError::malformed(format!("{i} does not fit in i32")))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Uint(u) => write!(f, "{u}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Value::Address(a) => write!(f, "{a}"),
            Value::Array(items) => {
                let parts: Vec<_> = items.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Struct(fields) => {
                let parts: Vec<_> = fields.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Enum { variant, value } => match value.as_ref() {
                Value::Unit => write!(f, "{variant}"),
                inner => write!(f, "{variant}({inner})"),
            },
        }
    }
}
