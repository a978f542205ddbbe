//! Value / JSON / binary-decoded projections of field types.
//!
//! Two faces over the same mapping: run-time conversions on [`Value`] (used by
//! the executable bundles) and Rust type / expression text (used by the
//! renderers). Both walk the field type grammar the same way, so the rendered
//! code and the in-process bundle agree on every representation.
use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::codec::Decoded;
use crate::codegen::{field_ident, to_pascal_case, type_ident};
use crate::emit::{enums, structs};
use crate::error::ConvertError;
use crate::idl::{IdlType, IdlTypeDefTy};
use crate::resolve::{DefinedKind, TypeTable};
use crate::value::Value;

/// Which value record a struct reference projects to in rendered code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    /// `XFields`, the plain record handed to constructors.
    Fields,
    /// `X`, the constructed type.
    Instance,
}

/// Rendered expression plus whether it evaluates to a `Result`.
#[derive(Debug, Clone)]
pub struct Expr {
    pub code: String,
    pub fallible: bool,
}

impl Expr {
    fn ok(code: String) -> Self {
        Expr { code, fallible: false }
    }

    fn fallible(code: String) -> Self {
        Expr { code, fallible: true }
    }

    /// Unwrap with `?`, tagging failures with `segment`.
    pub fn unwrap_within(&self, segment: &str) -> String {
        if self.fallible {
            format!("{}.map_err(|e| e.within({segment:?}))?", self.code)
        } else {
            self.code.clone()
        }
    }

    fn unwrap(&self) -> String {
        if self.fallible { format!("{}?", self.code) } else { self.code.clone() }
    }
}

pub(crate) fn at_field(path: &str, name: &str) -> String {
    if path.is_empty() { name.to_string() } else { format!("{path}.{name}") }
}

fn at_index(path: &str, i: usize) -> String {
    format!("{path}[{i}]")
}

fn mismatch(path: &str, ty: &IdlType, found: &Value) -> ConvertError {
    ConvertError::mismatch(path, ty.to_string(), found.kind_name())
}

fn json_mismatch(path: &str, expected: impl Into<String>, found: &Json) -> ConvertError {
    ConvertError::mismatch(path, expected, json_kind(found))
}

pub(crate) fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn unsigned_max(ty: &IdlType) -> Option<u128> {
    Some(match ty {
        IdlType::U8 => u8::MAX.into(),
        IdlType::U16 => u16::MAX.into(),
        IdlType::U32 => u32::MAX.into(),
        IdlType::U64 => u64::MAX.into(),
        IdlType::U128 => u128::MAX,
        _ => return None,
    })
}

fn signed_range(ty: &IdlType) -> Option<(i128, i128)> {
    Some(match ty {
        IdlType::I8 => (i8::MIN.into(), i8::MAX.into()),
        IdlType::I16 => (i16::MIN.into(), i16::MAX.into()),
        IdlType::I32 => (i32::MIN.into(), i32::MAX.into()),
        IdlType::I64 => (i64::MIN.into(), i64::MAX.into()),
        IdlType::I128 => (i128::MIN, i128::MAX),
        _ => return None,
    })
}

/// Source of a borrowed operand: `&obj.a` is used as the place `obj.a`.
fn recv(src: &str) -> &str {
    src.strip_prefix('&').unwrap_or(src)
}

/// Copy out of a borrowed operand.
fn copied(src: &str) -> String {
    match src.strip_prefix('&') {
        Some(place) => place.to_string(),
        None => format!("*{src}"),
    }
}

fn is_copy_primitive(ty: &IdlType) -> bool {
    matches!(
        ty,
        IdlType::Bool
            | IdlType::U8
            | IdlType::I8
            | IdlType::U16
            | IdlType::I16
            | IdlType::U32
            | IdlType::I32
            | IdlType::F32
            | IdlType::F64
    )
}

#[derive(Debug, Clone, Copy)]
pub struct Projector<'a> {
    table: &'a TypeTable,
}

impl<'a> Projector<'a> {
    pub fn new(table: &'a TypeTable) -> Self {
        Projector { table }
    }

    pub fn table(&self) -> &'a TypeTable {
        self.table
    }

    fn definition(&self, name: &str, path: &str) -> Result<&'a IdlTypeDefTy, ConvertError> {
        self.table
            .get(name)
            .map(|def| &def.ty)
            .map_err(|_| ConvertError::mismatch(path, format!("defined type `{name}`"), "unknown type"))
    }

    // ————————————————————————————————————————————————————————————————————————
    // RUN-TIME CONVERSIONS
    // ————————————————————————————————————————————————————————————————————————

    /// Binary-decoded container -> value.
    pub fn from_decoded(&self, ty: &IdlType, decoded: &Decoded, path: &str) -> Result<Value, ConvertError> {
        let here = |e: ConvertError| e.within(path);
        let value = match ty {
            IdlType::Bool => Value::Bool(decoded.to_bool().map_err(here)?),
            IdlType::U8 => Value::Unsigned(decoded.to_u8().map_err(here)?.into()),
            IdlType::U16 => Value::Unsigned(decoded.to_u16().map_err(here)?.into()),
            IdlType::U32 => Value::Unsigned(decoded.to_u32().map_err(here)?.into()),
            IdlType::U64 => Value::Unsigned(decoded.to_u64().map_err(here)?.into()),
            IdlType::U128 => Value::Unsigned(decoded.to_u128().map_err(here)?),
            IdlType::I8 => Value::Signed(decoded.to_i8().map_err(here)?.into()),
            IdlType::I16 => Value::Signed(decoded.to_i16().map_err(here)?.into()),
            IdlType::I32 => Value::Signed(decoded.to_i32().map_err(here)?.into()),
            IdlType::I64 => Value::Signed(decoded.to_i64().map_err(here)?.into()),
            IdlType::I128 => Value::Signed(decoded.to_i128().map_err(here)?),
            IdlType::F32 => Value::float(decoded.to_f32().map_err(here)?.into()),
            IdlType::F64 => Value::float(decoded.to_f64().map_err(here)?),
            IdlType::String => Value::String(decoded.to_string_value().map_err(here)?),
            IdlType::Bytes => Value::Bytes(decoded.to_bytes().map_err(here)?),
            IdlType::PublicKey => Value::PublicKey(decoded.to_public_key().map_err(here)?),
            IdlType::Vec(inner) => Value::List(self.decoded_items(inner, decoded.to_list().map_err(here)?, path)?),
            IdlType::Array(inner, len) => {
                let items = decoded.to_list().map_err(here)?;
                if items.len() != *len {
                    return Err(ConvertError::mismatch(path, ty.to_string(), format!("{} elements", items.len())));
                }
                Value::List(self.decoded_items(inner, items, path)?)
            }
            IdlType::Option(inner) => match decoded.to_option().map_err(here)? {
                None => Value::none(),
                Some(item) => Value::some(self.from_decoded(inner, item, path)?),
            },
            IdlType::HashMap(k, v) => {
                let entries = decoded.to_map().map_err(here)?;
                let mut out = Vec::with_capacity(entries.len());
                for (i, (key, val)) in entries.iter().enumerate() {
                    let at = at_index(path, i);
                    out.push((self.from_decoded(k, key, &at)?, self.from_decoded(v, val, &at)?));
                }
                Value::Map(out)
            }
            IdlType::Defined(name) => match self.definition(name, path)? {
                IdlTypeDefTy::Struct { fields } => structs::decode_struct(self, name, fields, decoded, path)?,
                IdlTypeDefTy::Enum { variants } => enums::decode_enum(self, name, variants, decoded, path)?,
            },
        };
        Ok(value)
    }

    fn decoded_items(&self, inner: &IdlType, items: &[Decoded], path: &str) -> Result<Vec<Value>, ConvertError> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.from_decoded(inner, item, &at_index(path, i)))
            .collect()
    }

    /// Value -> encodable tree. Also the validation pass behind constructors.
    pub fn to_encodable(&self, ty: &IdlType, value: &Value, path: &str) -> Result<Decoded, ConvertError> {
        let decoded = match (ty, value) {
            (IdlType::Bool, Value::Bool(b)) => Decoded::Bool(*b),
            (_, Value::Unsigned(n)) if unsigned_max(ty).is_some_and(|max| *n <= max) => Decoded::UInt(*n),
            (_, Value::Signed(i)) if signed_range(ty).is_some_and(|(lo, hi)| (lo..=hi).contains(i)) => {
                Decoded::Int(*i)
            }
            // an f32 field only holds values that survive the narrowing write
            (IdlType::F32, Value::Float(f)) if f.is_nan() || f64::from(f.0 as f32) == f.0 => Decoded::Float(f.0),
            (IdlType::F32, Value::Float(f)) => {
                return Err(ConvertError::mismatch(path, ty.to_string(), f.to_string()));
            }
            (IdlType::F64, Value::Float(f)) => Decoded::Float(f.0),
            (IdlType::String, Value::String(s)) => Decoded::String(s.clone()),
            (IdlType::Bytes, Value::Bytes(b)) => Decoded::Bytes(b.clone()),
            (IdlType::PublicKey, Value::PublicKey(key)) => Decoded::from(key),
            (IdlType::Vec(inner), Value::List(items)) => Decoded::List(self.encodable_items(inner, items, path)?),
            (IdlType::Array(inner, len), Value::List(items)) => {
                if items.len() != *len {
                    return Err(ConvertError::mismatch(path, ty.to_string(), format!("{} elements", items.len())));
                }
                Decoded::List(self.encodable_items(inner, items, path)?)
            }
            (IdlType::Option(inner), Value::Option(item)) => Decoded::Option(match item {
                None => None,
                Some(item) => Some(Box::new(self.to_encodable(inner, item, path)?)),
            }),
            (IdlType::HashMap(k, v), Value::Map(entries)) => {
                let mut out = Vec::with_capacity(entries.len());
                for (i, (key, val)) in entries.iter().enumerate() {
                    let at = at_index(path, i);
                    out.push((self.to_encodable(k, key, &at)?, self.to_encodable(v, val, &at)?));
                }
                Decoded::Map(out)
            }
            (IdlType::Defined(name), _) => match self.definition(name, path)? {
                IdlTypeDefTy::Struct { fields } => structs::encode_struct(self, name, fields, value, path)?,
                IdlTypeDefTy::Enum { variants } => enums::encode_enum(self, name, variants, value, path)?,
            },
            (_, Value::Unsigned(n)) if unsigned_max(ty).is_some() => {
                return Err(ConvertError::mismatch(path, ty.to_string(), n.to_string()));
            }
            (_, Value::Signed(i)) if signed_range(ty).is_some() => {
                return Err(ConvertError::mismatch(path, ty.to_string(), i.to_string()));
            }
            (_, other) => return Err(mismatch(path, ty, other)),
        };
        Ok(decoded)
    }

    fn encodable_items(&self, inner: &IdlType, items: &[Value], path: &str) -> Result<Vec<Decoded>, ConvertError> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.to_encodable(inner, item, &at_index(path, i)))
            .collect()
    }

    /// Value -> JSON mirror.
    pub fn to_json(&self, ty: &IdlType, value: &Value, path: &str) -> Result<Json, ConvertError> {
        let json = match (ty, value) {
            (IdlType::Bool, Value::Bool(b)) => Json::Bool(*b),
            (_, Value::Unsigned(n)) if ty.is_wide_integer() && unsigned_max(ty).is_some_and(|max| *n <= max) => {
                Json::String(n.to_string())
            }
            (_, Value::Signed(i)) if ty.is_wide_integer() && signed_range(ty).is_some_and(|(lo, hi)| (lo..=hi).contains(i)) => {
                Json::String(i.to_string())
            }
            (_, Value::Unsigned(n)) if unsigned_max(ty).is_some_and(|max| *n <= max) => {
                // at most 32 bits here
                Json::from(*n as u64)
            }
            (_, Value::Signed(i)) if signed_range(ty).is_some_and(|(lo, hi)| (lo..=hi).contains(i)) => {
                Json::from(*i as i64)
            }
            (IdlType::F32 | IdlType::F64, Value::Float(f)) => {
                serde_json::Number::from_f64(f.0).map(Json::Number).unwrap_or(Json::Null)
            }
            (IdlType::String, Value::String(s)) => Json::String(s.clone()),
            (IdlType::Bytes, Value::Bytes(b)) => Json::Array(b.iter().map(|byte| Json::from(*byte)).collect()),
            (IdlType::PublicKey, Value::PublicKey(key)) => Json::String(key.to_string()),
            (IdlType::Vec(inner), Value::List(items)) => Json::Array(self.json_items(inner, items, path)?),
            (IdlType::Array(inner, len), Value::List(items)) => {
                if items.len() != *len {
                    return Err(ConvertError::mismatch(path, ty.to_string(), format!("{} elements", items.len())));
                }
                Json::Array(self.json_items(inner, items, path)?)
            }
            (IdlType::Option(inner), Value::Option(item)) => match item {
                None => Json::Null,
                Some(item) => self.to_json(inner, item, path)?,
            },
            (IdlType::HashMap(k, v), Value::Map(entries)) => {
                let mut out = Vec::with_capacity(entries.len());
                for (i, (key, val)) in entries.iter().enumerate() {
                    let at = at_index(path, i);
                    out.push(Json::Array(vec![self.to_json(k, key, &at)?, self.to_json(v, val, &at)?]));
                }
                Json::Array(out)
            }
            (IdlType::Defined(name), _) => match self.definition(name, path)? {
                IdlTypeDefTy::Struct { fields } => structs::struct_to_json(self, name, fields, value, path)?,
                IdlTypeDefTy::Enum { variants } => enums::enum_to_json(self, name, variants, value, path)?,
            },
            (_, other) => return Err(mismatch(path, ty, other)),
        };
        Ok(json)
    }

    fn json_items(&self, inner: &IdlType, items: &[Value], path: &str) -> Result<Vec<Json>, ConvertError> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.to_json(inner, item, &at_index(path, i)))
            .collect()
    }

    /// JSON mirror -> value.
    pub fn from_json(&self, ty: &IdlType, json: &Json, path: &str) -> Result<Value, ConvertError> {
        let expected = || ty.to_string();
        let value = match ty {
            IdlType::Bool => Value::Bool(json.as_bool().ok_or_else(|| json_mismatch(path, expected(), json))?),
            IdlType::U8 | IdlType::U16 | IdlType::U32 => {
                let n = json.as_u64().ok_or_else(|| json_mismatch(path, expected(), json))?;
                self.check_unsigned(ty, n.into(), path)?
            }
            IdlType::I8 | IdlType::I16 | IdlType::I32 => {
                let i = json.as_i64().ok_or_else(|| json_mismatch(path, expected(), json))?;
                self.check_signed(ty, i.into(), path)?
            }
            IdlType::U64 | IdlType::U128 => {
                let text = json.as_str().ok_or_else(|| json_mismatch(path, "decimal integer string", json))?;
                let n = crate::runtime::parse_wide::<u128>(text).map_err(|e| e.within(path))?;
                self.check_unsigned(ty, n, path)?
            }
            IdlType::I64 | IdlType::I128 => {
                let text = json.as_str().ok_or_else(|| json_mismatch(path, "decimal integer string", json))?;
                let i = crate::runtime::parse_wide::<i128>(text).map_err(|e| e.within(path))?;
                self.check_signed(ty, i, path)?
            }
            IdlType::F32 => {
                let f = json.as_f64().ok_or_else(|| json_mismatch(path, expected(), json))?;
                Value::float((f as f32).into())
            }
            IdlType::F64 => Value::float(json.as_f64().ok_or_else(|| json_mismatch(path, expected(), json))?),
            IdlType::String => Value::String(
                json.as_str().ok_or_else(|| json_mismatch(path, expected(), json))?.to_string(),
            ),
            IdlType::Bytes => {
                let items = json.as_array().ok_or_else(|| json_mismatch(path, "array of bytes", json))?;
                let mut bytes = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let byte = item
                        .as_u64()
                        .and_then(|n| u8::try_from(n).ok())
                        .ok_or_else(|| json_mismatch(&at_index(path, i), "u8", item))?;
                    bytes.push(byte);
                }
                Value::Bytes(bytes)
            }
            IdlType::PublicKey => {
                let text = json.as_str().ok_or_else(|| json_mismatch(path, "base58 public key", json))?;
                Value::PublicKey(crate::runtime::parse_public_key(text).map_err(|e| e.within(path))?)
            }
            IdlType::Vec(inner) => {
                let items = json.as_array().ok_or_else(|| json_mismatch(path, expected(), json))?;
                Value::List(self.value_items(inner, items, path)?)
            }
            IdlType::Array(inner, len) => {
                let items = json.as_array().ok_or_else(|| json_mismatch(path, expected(), json))?;
                if items.len() != *len {
                    return Err(ConvertError::mismatch(path, expected(), format!("{} elements", items.len())));
                }
                Value::List(self.value_items(inner, items, path)?)
            }
            IdlType::Option(inner) => match json {
                Json::Null => Value::none(),
                other => Value::some(self.from_json(inner, other, path)?),
            },
            IdlType::HashMap(k, v) => {
                let entries = json.as_array().ok_or_else(|| json_mismatch(path, "array of [key, value] pairs", json))?;
                let mut out = Vec::with_capacity(entries.len());
                for (i, entry) in entries.iter().enumerate() {
                    let at = at_index(path, i);
                    match entry.as_array().map(Vec::as_slice) {
                        Some([key, val]) => out.push((self.from_json(k, key, &at)?, self.from_json(v, val, &at)?)),
                        _ => return Err(json_mismatch(&at, "[key, value] pair", entry)),
                    }
                }
                Value::Map(out)
            }
            IdlType::Defined(name) => match self.definition(name, path)? {
                IdlTypeDefTy::Struct { fields } => structs::struct_from_json(self, name, fields, json, path)?,
                IdlTypeDefTy::Enum { variants } => enums::enum_from_json(self, name, variants, json, path)?,
            },
        };
        Ok(value)
    }

    fn value_items(&self, inner: &IdlType, items: &[Json], path: &str) -> Result<Vec<Value>, ConvertError> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.from_json(inner, item, &at_index(path, i)))
            .collect()
    }

    fn check_unsigned(&self, ty: &IdlType, n: u128, path: &str) -> Result<Value, ConvertError> {
        match unsigned_max(ty) {
            Some(max) if n <= max => Ok(Value::Unsigned(n)),
            _ => Err(ConvertError::mismatch(path, ty.to_string(), n.to_string())),
        }
    }

    fn check_signed(&self, ty: &IdlType, i: i128, path: &str) -> Result<Value, ConvertError> {
        match signed_range(ty) {
            Some((lo, hi)) if (lo..=hi).contains(&i) => Ok(Value::Signed(i)),
            _ => Err(ConvertError::mismatch(path, ty.to_string(), i.to_string())),
        }
    }

    /// Convert a JSON record's named members, treating absent optional members as `None`.
    pub(crate) fn json_members<'f>(
        &self,
        members: impl IntoIterator<Item = (&'f str, &'f IdlType)>,
        object: &serde_json::Map<String, Json>,
        path: &str,
    ) -> Result<IndexMap<String, Value>, ConvertError> {
        let mut out = IndexMap::new();
        for (name, ty) in members {
            let at = at_field(path, name);
            let value = match (object.get(name), ty) {
                (Some(json), _) => self.from_json(ty, json, &at)?,
                (None, IdlType::Option(_)) => Value::none(),
                (None, _) => return Err(ConvertError::mismatch(at, format!("field `{name}`"), "nothing")),
            };
            out.insert(name.to_string(), value);
        }
        Ok(out)
    }

    // ————————————————————————————————————————————————————————————————————————
    // RUST TYPE TEXT
    // ————————————————————————————————————————————————————————————————————————

    /// Path to an item generated for `name`, as seen from `owner`'s module.
    pub fn item_path(&self, owner: &str, name: &str, item: &str) -> String {
        if owner == name {
            item.to_string()
        } else {
            format!("super::{}::{item}", field_ident(name))
        }
    }

    /// Rendering only reaches names the table validated on construction.
    fn defined_kind(&self, name: &str) -> DefinedKind {
        match self.table.kind_of(name) {
            Ok(kind) => kind,
            Err(err) => {
                debug_assert!(false, "{err}");
                tracing::error!(%err, "rendering a reference outside the type table");
                DefinedKind::Struct
            }
        }
    }

    /// An `Option` around `ty` inside `owner` must box when it closes a cycle.
    pub fn needs_box(&self, owner: &str, ty: &IdlType) -> bool {
        match ty {
            IdlType::Defined(name) => self.table.needs_indirection(owner, name),
            IdlType::Array(inner, _) => self.needs_box(owner, inner),
            _ => false,
        }
    }

    pub fn value_type(&self, owner: &str, ty: &IdlType, form: Form) -> String {
        match ty {
            IdlType::Bool => "bool".into(),
            IdlType::U8 => "u8".into(),
            IdlType::I8 => "i8".into(),
            IdlType::U16 => "u16".into(),
            IdlType::I16 => "i16".into(),
            IdlType::U32 => "u32".into(),
            IdlType::I32 => "i32".into(),
            IdlType::U64 => "u64".into(),
            IdlType::I64 => "i64".into(),
            IdlType::U128 => "u128".into(),
            IdlType::I128 => "i128".into(),
            IdlType::F32 => "f32".into(),
            IdlType::F64 => "f64".into(),
            IdlType::String => "String".into(),
            IdlType::Bytes => "Vec<u8>".into(),
            IdlType::PublicKey => "PublicKey".into(),
            IdlType::Vec(inner) => format!("Vec<{}>", self.value_type(owner, inner, form)),
            IdlType::Array(inner, len) => format!("[{}; {len}]", self.value_type(owner, inner, form)),
            IdlType::Option(inner) if self.needs_box(owner, inner) => {
                format!("Option<Box<{}>>", self.value_type(owner, inner, form))
            }
            IdlType::Option(inner) => format!("Option<{}>", self.value_type(owner, inner, form)),
            IdlType::HashMap(k, v) => format!(
                "Vec<({}, {})>",
                self.value_type(owner, k, form),
                self.value_type(owner, v, form)
            ),
            IdlType::Defined(name) => match (self.defined_kind(name), form) {
                (DefinedKind::Struct, Form::Fields) => {
                    self.item_path(owner, name, &format!("{}Fields", to_pascal_case(name)))
                }
                (DefinedKind::Struct, Form::Instance) => self.item_path(owner, name, &type_ident(name)),
                (DefinedKind::Enum, _) => self.item_path(owner, name, &format!("{}Kind", to_pascal_case(name))),
            },
        }
    }

    pub fn json_type(&self, owner: &str, ty: &IdlType) -> String {
        match ty {
            IdlType::U64 | IdlType::I64 | IdlType::U128 | IdlType::I128 | IdlType::PublicKey => "String".into(),
            IdlType::Vec(inner) | IdlType::Array(inner, _) => format!("Vec<{}>", self.json_type(owner, inner)),
            IdlType::Option(inner) if self.needs_box(owner, inner) => {
                format!("Option<Box<{}>>", self.json_type(owner, inner))
            }
            IdlType::Option(inner) => format!("Option<{}>", self.json_type(owner, inner)),
            IdlType::HashMap(k, v) => format!("Vec<({}, {})>", self.json_type(owner, k), self.json_type(owner, v)),
            IdlType::Defined(name) => self.item_path(owner, name, &format!("{}Json", to_pascal_case(name))),
            primitive => self.value_type(owner, primitive, Form::Instance),
        }
    }

    /// True when the JSON mirror of `ty` is the value type itself.
    fn json_identity(ty: &IdlType) -> bool {
        match ty {
            IdlType::Vec(inner) | IdlType::Option(inner) => Self::json_identity(inner),
            IdlType::HashMap(k, v) => Self::json_identity(k) && Self::json_identity(v),
            IdlType::String | IdlType::Bytes => true,
            other => is_copy_primitive(other),
        }
    }

    fn has_struct_ref(&self, ty: &IdlType) -> bool {
        match ty {
            IdlType::Defined(name) => self.defined_kind(name) == DefinedKind::Struct,
            IdlType::Vec(inner) | IdlType::Array(inner, _) | IdlType::Option(inner) => self.has_struct_ref(inner),
            IdlType::HashMap(k, v) => self.has_struct_ref(k) || self.has_struct_ref(v),
            _ => false,
        }
    }

    // ————————————————————————————————————————————————————————————————————————
    // RUST EXPRESSION TEXT
    //
    // `src` is always an expression of type `&T` (`&obj.a`, or a closure binding).
    // ————————————————————————————————————————————————————————————————————————

    /// `&Decoded` -> `Result<T, ConvertError>` (instance form).
    pub fn from_decoded_expr(&self, owner: &str, ty: &IdlType, src: &str) -> String {
        let accessor = match ty {
            IdlType::Bool => "to_bool",
            IdlType::U8 => "to_u8",
            IdlType::I8 => "to_i8",
            IdlType::U16 => "to_u16",
            IdlType::I16 => "to_i16",
            IdlType::U32 => "to_u32",
            IdlType::I32 => "to_i32",
            IdlType::U64 => "to_u64",
            IdlType::I64 => "to_i64",
            IdlType::U128 => "to_u128",
            IdlType::I128 => "to_i128",
            IdlType::F32 => "to_f32",
            IdlType::F64 => "to_f64",
            IdlType::String => "to_string_value",
            IdlType::Bytes => "to_bytes",
            IdlType::PublicKey => "to_public_key",
            IdlType::Vec(inner) => {
                return format!(
                    "{src}.to_list().and_then(|items| items.iter().map(|item| {}).collect::<Result<Vec<_>, _>>())",
                    self.from_decoded_expr(owner, inner, "item")
                );
            }
            IdlType::Array(inner, _) => {
                return format!(
                    "{src}.to_list().and_then(|items| items.iter().map(|item| {}).collect::<Result<Vec<_>, _>>()).and_then(runtime::into_array)",
                    self.from_decoded_expr(owner, inner, "item")
                );
            }
            IdlType::Option(inner) => {
                let mut item = self.from_decoded_expr(owner, inner, "item");
                if self.needs_box(owner, inner) {
                    item.push_str(".map(Box::new)");
                }
                return format!("{src}.to_option().and_then(|item| item.map(|item| {item}).transpose())");
            }
            IdlType::HashMap(k, v) => {
                return format!(
                    "{src}.to_map().and_then(|entries| entries.iter().map(|(key, val)| Ok::<_, ConvertError>(({}?, {}?))).collect::<Result<Vec<_>, _>>())",
                    self.from_decoded_expr(owner, k, "key"),
                    self.from_decoded_expr(owner, v, "val")
                );
            }
            IdlType::Defined(name) => {
                return match self.defined_kind(name) {
                    DefinedKind::Struct => format!("{}::from_decoded({src})", self.item_path(owner, name, &type_ident(name))),
                    DefinedKind::Enum => format!("{}({src})", self.item_path(owner, name, "from_decoded")),
                };
            }
        };
        format!("{src}.{accessor}()")
    }

    /// `&T` -> `Decoded`.
    pub fn to_encodable_expr(&self, owner: &str, ty: &IdlType, src: &str, form: Form) -> String {
        match ty {
            IdlType::Vec(inner) | IdlType::Array(inner, _) => format!(
                "Decoded::List({}.iter().map(|item| {}).collect())",
                recv(src),
                self.to_encodable_expr(owner, inner, "item", form)
            ),
            IdlType::Option(inner) => format!(
                "Decoded::Option({}.as_ref().map(|item| Box::new({})))",
                recv(src),
                self.to_encodable_expr(owner, inner, "item", form)
            ),
            IdlType::HashMap(k, v) => format!(
                "Decoded::Map({}.iter().map(|(key, val)| ({}, {})).collect())",
                recv(src),
                self.to_encodable_expr(owner, k, "key", form),
                self.to_encodable_expr(owner, v, "val", form)
            ),
            IdlType::Defined(name) => match (self.defined_kind(name), form) {
                (DefinedKind::Struct, Form::Fields) => {
                    format!("{}::to_encodable({src})", self.item_path(owner, name, &type_ident(name)))
                }
                (DefinedKind::Struct, Form::Instance) => format!("{}.encodable()", recv(src)),
                (DefinedKind::Enum, _) => format!("{}.to_encodable()", recv(src)),
            },
            _ => format!("Decoded::from({src})"),
        }
    }

    /// `&T` (instance form) -> JSON mirror type.
    pub fn to_json_expr(&self, owner: &str, ty: &IdlType, src: &str) -> String {
        if is_copy_primitive(ty) {
            return copied(src);
        }
        if Self::json_identity(ty) {
            return format!("{}.clone()", recv(src));
        }
        match ty {
            IdlType::U64 | IdlType::I64 | IdlType::U128 | IdlType::I128 | IdlType::PublicKey => {
                format!("{}.to_string()", recv(src))
            }
            IdlType::Vec(inner) | IdlType::Array(inner, _) => format!(
                "{}.iter().map(|item| {}).collect::<Vec<_>>()",
                recv(src),
                self.to_json_expr(owner, inner, "item")
            ),
            IdlType::Option(inner) => {
                let mut item = self.to_json_expr(owner, inner, "item");
                if self.needs_box(owner, inner) {
                    item = format!("Box::new({item})");
                }
                format!("{}.as_ref().map(|item| {item})", recv(src))
            }
            IdlType::HashMap(k, v) => format!(
                "{}.iter().map(|(key, val)| ({}, {})).collect::<Vec<_>>()",
                recv(src),
                self.to_json_expr(owner, k, "key"),
                self.to_json_expr(owner, v, "val")
            ),
            _ => format!("{}.to_json()", recv(src)),
        }
    }

    /// `&J` -> `T` (instance form), possibly through `Result`.
    pub fn from_json_expr(&self, owner: &str, ty: &IdlType, src: &str) -> Expr {
        if is_copy_primitive(ty) {
            return Expr::ok(copied(src));
        }
        if Self::json_identity(ty) {
            return Expr::ok(format!("{}.clone()", recv(src)));
        }
        match ty {
            IdlType::U64 | IdlType::I64 | IdlType::U128 | IdlType::I128 => {
                Expr::fallible(format!("runtime::parse_wide({src})"))
            }
            IdlType::PublicKey => Expr::fallible(format!("runtime::parse_public_key({src})")),
            IdlType::Vec(inner) => {
                let item = self.from_json_expr(owner, inner, "item");
                let collect = if item.fallible { "collect::<Result<Vec<_>, _>>()" } else { "collect::<Vec<_>>()" };
                Expr { code: format!("{}.iter().map(|item| {}).{collect}", recv(src), item.code), fallible: item.fallible }
            }
            IdlType::Array(inner, _) => {
                let item = self.from_json_expr(owner, inner, "item");
                let code = if Self::json_identity(inner) {
                    format!("runtime::into_array({}.clone())", recv(src))
                } else if item.fallible {
                    format!(
                        "{}.iter().map(|item| {}).collect::<Result<Vec<_>, _>>().and_then(runtime::into_array)",
                        recv(src),
                        item.code
                    )
                } else {
                    format!("runtime::into_array({}.iter().map(|item| {}).collect::<Vec<_>>())", recv(src), item.code)
                };
                Expr::fallible(code)
            }
            IdlType::Option(inner) => {
                let item = self.from_json_expr(owner, inner, "item");
                let boxed = self.needs_box(owner, inner);
                let code = match (item.fallible, boxed) {
                    (true, true) => format!("{}.as_ref().map(|item| {}.map(Box::new)).transpose()", recv(src), item.code),
                    (true, false) => format!("{}.as_ref().map(|item| {}).transpose()", recv(src), item.code),
                    (false, true) => format!("{}.as_ref().map(|item| Box::new({}))", recv(src), item.code),
                    (false, false) => format!("{}.as_ref().map(|item| {})", recv(src), item.code),
                };
                Expr { code, fallible: item.fallible }
            }
            IdlType::HashMap(k, v) => {
                let key = self.from_json_expr(owner, k, "key");
                let val = self.from_json_expr(owner, v, "val");
                if key.fallible || val.fallible {
                    Expr::fallible(format!(
                        "{}.iter().map(|(key, val)| Ok::<_, ConvertError>(({}, {}))).collect::<Result<Vec<_>, _>>()",
                        recv(src),
                        key.unwrap(),
                        val.unwrap()
                    ))
                } else {
                    Expr::ok(format!(
                        "{}.iter().map(|(key, val)| ({}, {})).collect::<Vec<_>>()",
                        recv(src),
                        key.code,
                        val.code
                    ))
                }
            }
            IdlType::Defined(name) => Expr::fallible(match self.defined_kind(name) {
                DefinedKind::Struct => format!("{}::from_json({src})", self.item_path(owner, name, &type_ident(name))),
                DefinedKind::Enum => format!("{}({src})", self.item_path(owner, name, "from_json")),
            }),
            // primitives are covered above
            _ => Expr::ok(format!("{}.clone()", recv(src))),
        }
    }

    /// Owned fields-form `src` -> instance form.
    pub fn initializer_expr(&self, owner: &str, ty: &IdlType, src: &str) -> String {
        if !self.has_struct_ref(ty) {
            return src.to_string();
        }
        match ty {
            IdlType::Defined(name) => format!("{}::new({src})", self.item_path(owner, name, &type_ident(name))),
            IdlType::Vec(inner) => format!(
                "{src}.into_iter().map(|item| {}).collect::<Vec<_>>()",
                self.initializer_expr(owner, inner, "item")
            ),
            IdlType::Array(inner, _) => format!("{src}.map(|item| {})", self.initializer_expr(owner, inner, "item")),
            IdlType::Option(inner) if self.needs_box(owner, inner) => {
                let unboxed = if matches!(**inner, IdlType::Defined(_)) { "*item" } else { "(*item)" };
                format!("{src}.map(|item| Box::new({}))", self.initializer_expr(owner, inner, unboxed))
            }
            IdlType::Option(inner) => format!("{src}.map(|item| {})", self.initializer_expr(owner, inner, "item")),
            IdlType::HashMap(k, v) => format!(
                "{src}.into_iter().map(|(key, val)| ({}, {})).collect::<Vec<_>>()",
                self.initializer_expr(owner, k, "key"),
                self.initializer_expr(owner, v, "val")
            ),
            _ => src.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idl::Idl;

    fn table() -> TypeTable {
        let idl = Idl::from_json_str(r#"{ "types": [
            { "name": "Node", "type": { "kind": "struct", "fields": [
                { "name": "value", "type": "u64" },
                { "name": "next", "type": { "option": { "defined": "Node" } } },
                { "name": "shape", "type": { "defined": "Shape" } }
            ] } },
            { "name": "Shape", "type": { "kind": "enum", "variants": [ { "name": "Unit" } ] } }
        ] }"#).unwrap();
        TypeTable::from_idl(&idl).unwrap()
    }

    #[test]
    fn value_and_json_type_text() {
        let t = table();
        let p = Projector::new(&t);
        let next = IdlType::Option(Box::new(IdlType::Defined("Node".into())));
        assert_eq!(p.value_type("Node", &next, Form::Fields), "Option<Box<NodeFields>>");
        assert_eq!(p.value_type("Node", &next, Form::Instance), "Option<Box<Node>>");
        assert_eq!(p.json_type("Node", &next), "Option<Box<NodeJson>>");
        let shape = IdlType::Defined("Shape".into());
        assert_eq!(p.value_type("Node", &shape, Form::Fields), "super::shape::ShapeKind");
        let map = IdlType::HashMap(Box::new(IdlType::PublicKey), Box::new(IdlType::U128));
        assert_eq!(p.value_type("Node", &map, Form::Instance), "Vec<(PublicKey, u128)>");
        assert_eq!(p.json_type("Node", &map), "Vec<(String, String)>");
    }

    #[test]
    fn expression_text() {
        let t = table();
        let p = Projector::new(&t);
        let vec_of_option = IdlType::Vec(Box::new(IdlType::Option(Box::new(IdlType::U64))));
        assert_eq!(
            p.to_json_expr("Node", &vec_of_option, "&self.vec_of_option"),
            "self.vec_of_option.iter().map(|item| item.as_ref().map(|item| item.to_string())).collect::<Vec<_>>()"
        );
        let from = p.from_json_expr("Node", &vec_of_option, "&obj.vec_of_option");
        assert!(from.fallible);
        assert_eq!(
            from.code,
            "obj.vec_of_option.iter().map(|item| item.as_ref().map(|item| runtime::parse_wide(item)).transpose()).collect::<Result<Vec<_>, _>>()"
        );
        let next = IdlType::Option(Box::new(IdlType::Defined("Node".into())));
        assert_eq!(p.initializer_expr("Node", &next, "fields.next"), "fields.next.map(|item| Box::new(Node::new(*item)))");
        assert_eq!(p.to_encodable_expr("Node", &IdlType::U8, "&fields.a", Form::Fields), "Decoded::from(&fields.a)");
        assert_eq!(p.from_json_expr("Node", &IdlType::Bool, "flag").code, "*flag");
    }

    #[test]
    fn run_time_conversions_carry_paths() {
        let t = table();
        let p = Projector::new(&t);
        let ty = IdlType::Vec(Box::new(IdlType::U8));
        let err = p
            .from_json(&ty, &serde_json::json!([1, 2, 300]), "Foo.bytes")
            .unwrap_err();
        assert_eq!(err, ConvertError::mismatch("Foo.bytes[2]", "u8", "300"));

        let wide = IdlType::U64;
        assert_eq!(p.to_json(&wide, &Value::Unsigned(7), "x").unwrap(), serde_json::json!("7"));
        assert!(p.to_encodable(&IdlType::U8, &Value::Unsigned(256), "x").is_err());
        assert!(p.to_encodable(&IdlType::I8, &Value::Unsigned(1), "x").is_err());
    }

    #[test]
    fn f32_fields_only_accept_exact_values() {
        let t = table();
        let p = Projector::new(&t);
        let err = p.to_encodable(&IdlType::F32, &Value::float(0.1), "Foo.a").unwrap_err();
        assert_eq!(err, ConvertError::mismatch("Foo.a", "f32", "0.1"));
        let narrowed = f64::from(0.1f32);
        assert_eq!(p.to_encodable(&IdlType::F32, &Value::float(narrowed), "x").unwrap(), Decoded::Float(narrowed));
        assert!(p.to_encodable(&IdlType::F32, &Value::float(f64::NAN), "x").is_ok());
        assert!(p.to_encodable(&IdlType::F32, &Value::float(1e300), "x").is_err());
        assert!(p.to_encodable(&IdlType::F64, &Value::float(0.1), "x").is_ok());
        // JSON input is narrowed on the way in
        assert_eq!(p.from_json(&IdlType::F32, &serde_json::json!(0.1), "x").unwrap(), Value::float(narrowed));
    }
}
