//! Binary layout grammar and the synthesizer mapping field types onto it.
//!
//! Defined types are carried by name (`Layout::Defined`) and looked up in a
//! [`LayoutRegistry`] when bytes are actually read or written. That keeps every
//! layout finite even when the type graph has cycles.
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::GenError;
use crate::idl::{IdlType, IdlTypeDef, IdlTypeDefTy, VariantShape};
use crate::resolve::TypeTable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Layout {
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
    Vec(Box<Layout>),
    Array(Box<Layout>, usize),
    Option(Box<Layout>),
    HashMap(Box<Layout>, Box<Layout>),
    /// Ordered keyed record; also the payload of every enum variant.
    Struct(IndexMap<String, Layout>),
    /// Discriminated union: u8 tag (= position) followed by the variant's struct.
    Enum(IndexMap<String, Layout>),
    Defined(String),
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDERS (also the vocabulary rendered into generated code)
// ————————————————————————————————————————————————————————————————————————————

impl Layout {
    pub fn vec(inner: Layout) -> Layout {
        Layout::Vec(Box::new(inner))
    }

    pub fn array(inner: Layout, len: usize) -> Layout {
        Layout::Array(Box::new(inner), len)
    }

    pub fn option(inner: Layout) -> Layout {
        Layout::Option(Box::new(inner))
    }

    pub fn hash_map(key: Layout, value: Layout) -> Layout {
        Layout::HashMap(Box::new(key), Box::new(value))
    }

    /// Empty record, the payload of a variant without fields.
    pub fn unit() -> Layout {
        Layout::Struct(IndexMap::new())
    }

    pub fn defined(name: &str) -> Layout {
        Layout::Defined(name.to_string())
    }

    pub fn structure<'a>(fields: impl IntoIterator<Item = (&'a str, Layout)>) -> Layout {
        Layout::Struct(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub fn enumeration<'a>(variants: impl IntoIterator<Item = (&'a str, Layout)>) -> Layout {
        Layout::Enum(variants.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Short name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Layout::Bool => "bool",
            Layout::U8 => "u8",
            Layout::I8 => "i8",
            Layout::U16 => "u16",
            Layout::I16 => "i16",
            Layout::U32 => "u32",
            Layout::I32 => "i32",
            Layout::U64 => "u64",
            Layout::I64 => "i64",
            Layout::U128 => "u128",
            Layout::I128 => "i128",
            Layout::F32 => "f32",
            Layout::F64 => "f64",
            Layout::String => "string",
            Layout::Bytes => "bytes",
            Layout::PublicKey => "publicKey",
            Layout::Vec(_) => "vec",
            Layout::Array(..) => "array",
            Layout::Option(_) => "option",
            Layout::HashMap(..) => "hashMap",
            Layout::Struct(_) => "struct",
            Layout::Enum(_) => "enum",
            Layout::Defined(_) => "defined",
        }
    }

    /// Encoded size when it does not depend on the value.
    pub fn fixed_size(&self, registry: &LayoutRegistry) -> Option<usize> {
        match self {
            Layout::Bool | Layout::U8 | Layout::I8 => Some(1),
            Layout::U16 | Layout::I16 => Some(2),
            Layout::U32 | Layout::I32 | Layout::F32 => Some(4),
            Layout::U64 | Layout::I64 | Layout::F64 => Some(8),
            Layout::U128 | Layout::I128 => Some(16),
            Layout::PublicKey => Some(32),
            Layout::String | Layout::Bytes | Layout::Vec(_) | Layout::Option(_) | Layout::HashMap(..) => None,
            Layout::Array(inner, len) => inner.fixed_size(registry).map(|n| n * len),
            Layout::Struct(fields) => fields.values().map(|l| l.fixed_size(registry)).sum(),
            Layout::Enum(variants) => {
                let mut sizes = variants.values().map(|l| l.fixed_size(registry));
                let first = sizes.next()??;
                sizes.all(|s| s == Some(first)).then_some(1 + first)
            }
            Layout::Defined(name) => registry.get(name)?.fixed_size(registry),
        }
    }

    /// Rust builder expression that reconstructs this layout.
    pub fn to_rust(&self) -> String {
        match self {
            Layout::Vec(inner) => format!("Layout::vec({})", inner.to_rust()),
            Layout::Array(inner, len) => format!("Layout::array({}, {len})", inner.to_rust()),
            Layout::Option(inner) => format!("Layout::option({})", inner.to_rust()),
            Layout::HashMap(k, v) => format!("Layout::hash_map({}, {})", k.to_rust(), v.to_rust()),
            Layout::Defined(name) => format!("Layout::defined({name:?})"),
            Layout::Struct(fields) if fields.is_empty() => "Layout::unit()".to_string(),
            Layout::Struct(fields) => format!("Layout::structure([{}])", keyed_list(fields)),
            Layout::Enum(variants) => format!("Layout::enumeration([{}])", keyed_list(variants)),
            primitive => format!("Layout::{primitive:?}"),
        }
    }
}

fn keyed_list(entries: &IndexMap<String, Layout>) -> String {
    entries
        .iter()
        .map(|(k, v)| format!("({k:?}, {})", v.to_rust()))
        .collect::<Vec<_>>()
        .join(", ")
}

// ————————————————————————————————————————————————————————————————————————————
// SYNTHESIS
// ————————————————————————————————————————————————————————————————————————————

/// Layout fragment for one field type.
pub fn field_layout(table: &TypeTable, ty: &IdlType) -> Result<Layout, GenError> {
    let layout = match ty {
        IdlType::Bool => Layout::Bool,
        IdlType::U8 => Layout::U8,
        IdlType::I8 => Layout::I8,
        IdlType::U16 => Layout::U16,
        IdlType::I16 => Layout::I16,
        IdlType::U32 => Layout::U32,
        IdlType::I32 => Layout::I32,
        IdlType::U64 => Layout::U64,
        IdlType::I64 => Layout::I64,
        IdlType::U128 => Layout::U128,
        IdlType::I128 => Layout::I128,
        IdlType::F32 => Layout::F32,
        IdlType::F64 => Layout::F64,
        IdlType::String => Layout::String,
        IdlType::Bytes => Layout::Bytes,
        IdlType::PublicKey => Layout::PublicKey,
        IdlType::Vec(inner) => Layout::vec(field_layout(table, inner)?),
        IdlType::Array(inner, len) => Layout::array(field_layout(table, inner)?, *len),
        IdlType::Option(inner) => Layout::option(field_layout(table, inner)?),
        IdlType::HashMap(k, v) => Layout::hash_map(field_layout(table, k)?, field_layout(table, v)?),
        IdlType::Defined(name) => {
            // existence check only; the body is looked up lazily
            table.kind_of(name)?;
            Layout::defined(name)
        }
    };
    Ok(layout)
}

/// Payload layout for one enum variant: empty, field-keyed or `_0`, `_1`, ... keyed.
pub fn variant_layout(table: &TypeTable, shape: VariantShape<'_>) -> Result<Layout, GenError> {
    let mut fields = IndexMap::new();
    match shape {
        VariantShape::Empty => {}
        VariantShape::Named(named) => {
            for f in named {
                fields.insert(f.name.clone(), field_layout(table, &f.ty)?);
            }
        }
        VariantShape::Tuple(types) => {
            for (i, ty) in types.iter().enumerate() {
                fields.insert(format!("_{i}"), field_layout(table, ty)?);
            }
        }
    }
    Ok(Layout::Struct(fields))
}

/// Full layout for a type definition.
pub fn type_layout(table: &TypeTable, def: &IdlTypeDef) -> Result<Layout, GenError> {
    match &def.ty {
        IdlTypeDefTy::Struct { fields } => {
            let mut out = IndexMap::with_capacity(fields.len());
            for f in fields {
                out.insert(f.name.clone(), field_layout(table, &f.ty)?);
            }
            Ok(Layout::Struct(out))
        }
        IdlTypeDefTy::Enum { variants } => {
            let mut out = IndexMap::with_capacity(variants.len());
            for v in variants {
                out.insert(v.name.clone(), variant_layout(table, v.shape())?);
            }
            Ok(Layout::Enum(out))
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY
// ————————————————————————————————————————————————————————————————————————————

/// Name -> layout lookup used to resolve `Layout::Defined` at encode/parse time.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct LayoutRegistry {
    layouts: IndexMap<String, Layout>,
}

impl LayoutRegistry {
    pub fn from_table(table: &TypeTable) -> Result<Self, GenError> {
        let mut layouts = IndexMap::with_capacity(table.len());
        for def in table.defs() {
            layouts.insert(def.name.clone(), type_layout(table, def)?);
        }
        Ok(LayoutRegistry { layouts })
    }

    pub fn insert(&mut self, name: impl Into<String>, layout: Layout) {
        self.layouts.insert(name.into(), layout);
    }

    pub fn get(&self, name: &str) -> Option<&Layout> {
        self.layouts.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Layout)> {
        self.layouts.iter()
    }
}

impl<'a> FromIterator<(&'a str, Layout)> for LayoutRegistry {
    fn from_iter<I: IntoIterator<Item = (&'a str, Layout)>>(iter: I) -> Self {
        LayoutRegistry {
            layouts: iter.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idl::Idl;

    fn shapes_table() -> TypeTable {
        let idl = Idl::from_json_str(r#"{ "types": [
            { "name": "Shape", "type": { "kind": "enum", "variants": [
                { "name": "Circle", "fields": [ { "name": "radius", "type": "f64" } ] },
                { "name": "Unit" },
                { "name": "Pair", "fields": [ "u8", "u16" ] }
            ] } },
            { "name": "Holder", "type": { "kind": "struct", "fields": [
                { "name": "shape", "type": { "defined": "Shape" } },
                { "name": "tags", "type": { "hashMap": [ "string", { "array": [ "i32", 3 ] } ] } }
            ] } }
        ] }"#).unwrap();
        TypeTable::from_idl(&idl).unwrap()
    }

    #[test]
    fn enum_variants_use_named_and_positional_keys() {
        let table = shapes_table();
        let layout = type_layout(&table, table.get("Shape").unwrap()).unwrap();
        assert_eq!(
            layout,
            Layout::enumeration([
                ("Circle", Layout::structure([("radius", Layout::F64)])),
                ("Unit", Layout::unit()),
                ("Pair", Layout::structure([("_0", Layout::U8), ("_1", Layout::U16)])),
            ])
        );
    }

    #[test]
    fn nested_containers_and_references() {
        let table = shapes_table();
        let layout = type_layout(&table, table.get("Holder").unwrap()).unwrap();
        assert_eq!(
            layout.to_rust(),
            r#"Layout::structure([("shape", Layout::defined("Shape")), ("tags", Layout::hash_map(Layout::String, Layout::array(Layout::I32, 3)))])"#
        );
    }

    #[test]
    fn fixed_sizes_per_variant_shape() {
        let table = shapes_table();
        let registry = LayoutRegistry::from_table(&table).unwrap();
        let Some(Layout::Enum(variants)) = registry.get("Shape") else { panic!() };
        assert_eq!(variants["Circle"].fixed_size(&registry), Some(8));
        assert_eq!(variants["Unit"].fixed_size(&registry), Some(0));
        assert_eq!(variants["Pair"].fixed_size(&registry), Some(3));
        // variants differ in size, so the union as a whole is not fixed
        assert_eq!(registry.get("Shape").unwrap().fixed_size(&registry), None);
        assert_eq!(Layout::array(Layout::PublicKey, 2).fixed_size(&registry), Some(64));
    }
}
