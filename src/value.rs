//! Dynamic in-memory values for IDL types.
//!
//! Integers are stored widened (`u128`/`i128`); the field type decides the
//! real width. Floats use `OrderedFloat` so NaN payloads compare equal and a
//! binary round trip of any bit pattern yields an equal value.
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use thiserror::Error;

// ————————————————————————————————————————————————————————————————————————————
// PUBLIC KEY
// ————————————————————————————————————————————————————————————————————————————

/// 32-byte account identifier; textual form is base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PublicKey(pub [u8; 32]);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublicKeyError {
    #[error("invalid base58: {0}")]
    InvalidBase58(String),
    #[error("public key must be 32 bytes, got {0}")]
    WrongLength(usize),
}

impl PublicKey {
    pub const LEN: usize = 32;

    pub fn new(bytes: [u8; 32]) -> Self {
        PublicKey(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PublicKeyError> {
        let raw: [u8; 32] = bytes
            .try_into()
            .map_err(|_| PublicKeyError::WrongLength(bytes.len()))?;
        Ok(PublicKey(raw))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

impl FromStr for PublicKey {
    type Err = PublicKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| PublicKeyError::InvalidBase58(e.to_string()))?;
        PublicKey::from_slice(&bytes)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// VALUES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Unsigned(u128),
    Signed(i128),
    Float(OrderedFloat<f64>),
    String(String),
    Bytes(Vec<u8>),
    PublicKey(PublicKey),
    /// Both `vec` and fixed `array` values.
    List(Vec<Value>),
    Option(Option<Box<Value>>),
    /// Hash map entries in insertion order.
    Map(Vec<(Value, Value)>),
    Struct(StructValue),
    Enum(EnumValue),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructValue {
    pub type_name: String,
    pub fields: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub type_name: String,
    pub kind: String,
    pub discriminator: u8,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Empty,
    Named(IndexMap<String, Value>),
    Tuple(Vec<Value>),
}

impl Value {
    pub fn some(inner: Value) -> Value {
        Value::Option(Some(Box::new(inner)))
    }

    pub fn none() -> Value {
        Value::Option(None)
    }

    pub fn float(f: f64) -> Value {
        Value::Float(OrderedFloat(f))
    }

    /// Short description for mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Unsigned(_) => "unsigned integer",
            Value::Signed(_) => "signed integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::PublicKey(_) => "public key",
            Value::List(_) => "list",
            Value::Option(_) => "option",
            Value::Map(_) => "map",
            Value::Struct(_) => "struct",
            Value::Enum(_) => "enum",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Unsigned(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Signed(v.into())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<PublicKey> for Value {
    fn from(v: PublicKey) -> Self {
        Value::PublicKey(v)
    }
}
