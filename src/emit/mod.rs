//! Per-type bundles: the executable operations and the Rust source rendered for them.
//!
//! Both faces come from the same definition and the same [`Projector`], so a
//! bundle and its rendered module agree on layout, JSON shape and conversions.
use serde_json::Value as Json;

use crate::codec::Decoded;
use crate::codegen::Codegen;
use crate::error::{ConvertError, GenError};
use crate::idl::IdlTypeDefTy;
use crate::layout::{Layout, LayoutRegistry, type_layout};
use crate::module::GeneratorConfig;
use crate::project::Projector;
use crate::resolve::TypeTable;
use crate::runtime;
use crate::value::Value;

pub mod enums;
pub mod structs;

pub use enums::{EnumBundle, VariantInfo};
pub use structs::StructBundle;

#[derive(Debug)]
pub enum TypeBundle<'a> {
    Struct(StructBundle<'a>),
    Enum(EnumBundle<'a>),
}

impl<'a> TypeBundle<'a> {
    pub fn new(table: &'a TypeTable, name: &str) -> Result<Self, GenError> {
        let def = table.get(name)?;
        let layout = type_layout(table, def)?;
        let projector = Projector::new(table);
        Ok(match &def.ty {
            IdlTypeDefTy::Struct { fields } => {
                TypeBundle::Struct(StructBundle::new(projector, &def.name, fields, layout))
            }
            IdlTypeDefTy::Enum { variants } => {
                TypeBundle::Enum(EnumBundle::new(projector, &def.name, variants, layout))
            }
        })
    }

    pub fn name(&self) -> &'a str {
        match self {
            TypeBundle::Struct(b) => b.name(),
            TypeBundle::Enum(b) => b.name(),
        }
    }

    pub fn layout(&self) -> &Layout {
        match self {
            TypeBundle::Struct(b) => b.layout(),
            TypeBundle::Enum(b) => b.layout(),
        }
    }

    pub fn from_decoded(&self, decoded: &Decoded) -> Result<Value, ConvertError> {
        match self {
            TypeBundle::Struct(b) => b.from_decoded(decoded),
            TypeBundle::Enum(b) => b.from_decoded(decoded),
        }
    }

    pub fn to_encodable(&self, value: &Value) -> Result<Decoded, ConvertError> {
        match self {
            TypeBundle::Struct(b) => b.to_encodable(value),
            TypeBundle::Enum(b) => b.to_encodable(value),
        }
    }

    pub fn to_json(&self, value: &Value) -> Result<Json, ConvertError> {
        match self {
            TypeBundle::Struct(b) => b.to_json(value),
            TypeBundle::Enum(b) => b.to_json(value),
        }
    }

    pub fn from_json(&self, json: &Json) -> Result<Value, ConvertError> {
        match self {
            TypeBundle::Struct(b) => b.from_json(json),
            TypeBundle::Enum(b) => b.from_json(json),
        }
    }

    /// value -> encodable -> bytes
    pub fn encode(&self, value: &Value, registry: &LayoutRegistry) -> Result<Vec<u8>, runtime::Error> {
        let encodable = self.to_encodable(value)?;
        Ok(self.layout().encode(&encodable, registry)?)
    }

    /// bytes -> decoded -> value
    pub fn decode(&self, bytes: &[u8], registry: &LayoutRegistry) -> Result<Value, runtime::Error> {
        let decoded = self.layout().parse(bytes, registry)?;
        Ok(self.from_decoded(&decoded)?)
    }

    /// Full source of this type's generated module.
    pub fn render(&self, config: &GeneratorConfig) -> Result<String, GenError> {
        let mut cg = Codegen::new();
        let kind = match self {
            TypeBundle::Struct(_) => "struct",
            TypeBundle::Enum(_) => "enum",
        };
        cg.line(format!("//! `{}` ({kind}) generated from the IDL. Do not edit by hand.", self.name()));
        cg.line("#![allow(unused_imports, clippy::redundant_closure)]");
        cg.blank();
        cg.line("use serde::{Deserialize, Serialize};");
        cg.line(format!(
            "use {}::{{self, CodecError, ConvertError, Decoded, Layout, PublicKey}};",
            config.runtime_path
        ));
        cg.blank();
        match self {
            TypeBundle::Struct(b) => b.render(&mut cg)?,
            TypeBundle::Enum(b) => b.render(&mut cg)?,
        }
        tracing::debug!(type_name = self.name(), kind, "rendered module");
        Ok(cg.into_string())
    }
}

/// `#[serde(rename)]` when the Rust identifier differs from the IDL name.
pub(crate) fn rename_attr(cg: &mut Codegen, ident: &str, name: &str) {
    if crate::codegen::module_file_stem(ident) != name {
        cg.line(format!("#[serde(rename = {name:?})]"));
    }
}
