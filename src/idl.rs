// Strongly-typed IDL model. Only the `types` section is consumed; the rest of
// the document (instructions, accounts, events) is ignored here.
use std::fmt;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Idl {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub types: Vec<IdlTypeDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlTypeDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: IdlTypeDefTy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdlTypeDefTy {
    Struct { fields: Vec<IdlField> },
    Enum { variants: Vec<IdlEnumVariant> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: IdlType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlEnumVariant {
    pub name: String,
    #[serde(default)]
    pub fields: Option<IdlEnumFields>,
}

// Named is tried first: a list of bare type expressions never parses as fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdlEnumFields {
    Named(Vec<IdlField>),
    Tuple(Vec<IdlType>),
}

/// The three payload shapes a variant can take.
#[derive(Debug, Clone, Copy)]
pub enum VariantShape<'a> {
    Empty,
    Named(&'a [IdlField]),
    Tuple(&'a [IdlType]),
}

impl IdlEnumVariant {
    /// Absent and empty field lists both mean "no payload".
    pub fn shape(&self) -> VariantShape<'_> {
        match &self.fields {
            None => VariantShape::Empty,
            Some(IdlEnumFields::Named(fields)) if fields.is_empty() => VariantShape::Empty,
            Some(IdlEnumFields::Tuple(types)) if types.is_empty() => VariantShape::Empty,
            Some(IdlEnumFields::Named(fields)) => VariantShape::Named(fields),
            Some(IdlEnumFields::Tuple(types)) => VariantShape::Tuple(types),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// FIELD TYPE GRAMMAR
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawIdlType")]
pub enum IdlType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    U128,
    I128,
    F32,
    F64,
    String,
    Bytes,
    PublicKey,
    Vec(Box<IdlType>),
    Option(Box<IdlType>),
    Array(Box<IdlType>, usize),
    HashMap(Box<IdlType>, Box<IdlType>),
    Defined(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdlType {
    Primitive(String),
    Composite(CompositeIdlType),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
enum CompositeIdlType {
    Vec(Box<IdlType>),
    Option(Box<IdlType>),
    Array(Box<IdlType>, usize),
    Defined(String),
    HashMap(Box<IdlType>, Box<IdlType>),
}

impl TryFrom<RawIdlType> for IdlType {
    type Error = String;

    fn try_from(raw: RawIdlType) -> Result<Self, Self::Error> {
        let ty = match raw {
            RawIdlType::Primitive(name) => match name.as_str() {
                "bool" => IdlType::Bool,
                "u8" => IdlType::U8,
                "i8" => IdlType::I8,
                "u16" => IdlType::U16,
                "i16" => IdlType::I16,
                "u32" => IdlType::U32,
                "i32" => IdlType::I32,
                "u64" => IdlType::U64,
                "i64" => IdlType::I64,
                "u128" => IdlType::U128,
                "i128" => IdlType::I128,
                "f32" => IdlType::F32,
                "f64" => IdlType::F64,
                "string" => IdlType::String,
                "bytes" => IdlType::Bytes,
                "publicKey" => IdlType::PublicKey,
                other => return Err(format!("unknown primitive type `{other}`")),
            },
            RawIdlType::Composite(CompositeIdlType::Vec(inner)) => IdlType::Vec(inner),
            RawIdlType::Composite(CompositeIdlType::Option(inner)) => IdlType::Option(inner),
            RawIdlType::Composite(CompositeIdlType::Array(inner, len)) => IdlType::Array(inner, len),
            RawIdlType::Composite(CompositeIdlType::Defined(name)) => IdlType::Defined(name),
            RawIdlType::Composite(CompositeIdlType::HashMap(k, v)) => IdlType::HashMap(k, v),
        };
        Ok(ty)
    }
}

impl IdlType {
    /// Integer widths of 64 bits and up travel through JSON as strings.
    pub fn is_wide_integer(&self) -> bool {
        matches!(self, IdlType::U64 | IdlType::I64 | IdlType::U128 | IdlType::I128)
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            IdlType::Vec(_) | IdlType::Option(_) | IdlType::Array(..) | IdlType::HashMap(..) | IdlType::Defined(_)
        )
    }
}

impl fmt::Display for IdlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdlType::Bool => f.write_str("bool"),
            IdlType::U8 => f.write_str("u8"),
            IdlType::I8 => f.write_str("i8"),
            IdlType::U16 => f.write_str("u16"),
            IdlType::I16 => f.write_str("i16"),
            IdlType::U32 => f.write_str("u32"),
            IdlType::I32 => f.write_str("i32"),
            IdlType::U64 => f.write_str("u64"),
            IdlType::I64 => f.write_str("i64"),
            IdlType::U128 => f.write_str("u128"),
            IdlType::I128 => f.write_str("i128"),
            IdlType::F32 => f.write_str("f32"),
            IdlType::F64 => f.write_str("f64"),
            IdlType::String => f.write_str("string"),
            IdlType::Bytes => f.write_str("bytes"),
            IdlType::PublicKey => f.write_str("publicKey"),
            IdlType::Vec(inner) => write!(f, "vec<{inner}>"),
            IdlType::Option(inner) => write!(f, "option<{inner}>"),
            IdlType::Array(inner, len) => write!(f, "[{inner}; {len}]"),
            IdlType::HashMap(k, v) => write!(f, "hashMap<{k}, {v}>"),
            IdlType::Defined(name) => f.write_str(name),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// LOADING
// ————————————————————————————————————————————————————————————————————————————

impl Idl {
    pub fn from_json_str(src: &str) -> Result<Self, crate::error::GenError> {
        crate::path_de::from_str_with_path(src).map_err(crate::error::GenError::Parse)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, crate::error::GenError> {
        crate::path_de::from_value_with_path(value).map_err(crate::error::GenError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_anchor_style_types() {
        let idl = Idl::from_json_str(r#"{
            "version": "0.1.0",
            "name": "demo",
            "instructions": [],
            "types": [
                { "name": "State", "type": { "kind": "struct", "fields": [
                    { "name": "vecOfOption", "type": { "vec": { "option": "u64" } } },
                    { "name": "grid", "type": { "array": [ "u8", 4 ] } },
                    { "name": "owners", "type": { "hashMap": [ "publicKey", { "defined": "Shape" } ] } }
                ] } },
                { "name": "Shape", "type": { "kind": "enum", "variants": [
                    { "name": "Circle", "fields": [ { "name": "radius", "type": "f64" } ] },
                    { "name": "Unit" },
                    { "name": "Pair", "fields": [ "u8", { "defined": "State" } ] },
                    { "name": "Blank", "fields": [] }
                ] } }
            ]
        }"#).unwrap();

        assert_eq!(idl.types.len(), 2);
        let IdlTypeDefTy::Struct { fields } = &idl.types[0].ty else { panic!("expected struct") };
        assert_eq!(fields[0].ty, IdlType::Vec(Box::new(IdlType::Option(Box::new(IdlType::U64)))));
        assert_eq!(fields[1].ty, IdlType::Array(Box::new(IdlType::U8), 4));
        assert_eq!(fields[2].ty.to_string(), "hashMap<publicKey, Shape>");

        let IdlTypeDefTy::Enum { variants } = &idl.types[1].ty else { panic!("expected enum") };
        assert!(matches!(variants[0].shape(), VariantShape::Named(f) if f.len() == 1));
        assert!(matches!(variants[1].shape(), VariantShape::Empty));
        assert!(matches!(variants[2].shape(), VariantShape::Tuple(t) if t.len() == 2));
        assert!(matches!(variants[3].shape(), VariantShape::Empty));
    }

    #[test]
    fn parse_errors_carry_the_json_path() {
        let err = Idl::from_json_str(r#"{ "types": [
            { "name": "A", "type": { "kind": "struct", "fields": [ { "name": "x", "type": "u256" } ] } }
        ] }"#).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("types[0]"), "{msg}");
    }
}
