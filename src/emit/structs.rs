//! Struct bundles.
use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::codec::Decoded;
use crate::codegen::{Codegen, field_ident, to_pascal_case, type_ident};
use crate::error::{ConvertError, GenError};
use crate::idl::IdlField;
use crate::layout::Layout;
use crate::project::{Form, Projector, at_field, json_kind};
use crate::value::{StructValue, Value};

use super::rename_attr;

#[derive(Debug)]
pub struct StructBundle<'a> {
    projector: Projector<'a>,
    name: &'a str,
    fields: &'a [IdlField],
    layout: Layout,
}

impl<'a> StructBundle<'a> {
    pub fn new(projector: Projector<'a>, name: &'a str, fields: &'a [IdlField], layout: Layout) -> Self {
        StructBundle { projector, name, fields, layout }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn fields(&self) -> &'a [IdlField] {
        self.fields
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Build an instance from a fields record; missing, extra or mistyped fields are rejected.
    pub fn construct(&self, fields: IndexMap<String, Value>) -> Result<Value, ConvertError> {
        let value = Value::Struct(StructValue { type_name: self.name.to_string(), fields });
        self.to_encodable(&value)?;
        Ok(value)
    }

    pub fn from_decoded(&self, decoded: &Decoded) -> Result<Value, ConvertError> {
        decode_struct(&self.projector, self.name, self.fields, decoded, self.name)
    }

    pub fn to_encodable(&self, value: &Value) -> Result<Decoded, ConvertError> {
        encode_struct(&self.projector, self.name, self.fields, value, self.name)
    }

    pub fn to_json(&self, value: &Value) -> Result<Json, ConvertError> {
        struct_to_json(&self.projector, self.name, self.fields, value, self.name)
    }

    pub fn from_json(&self, json: &Json) -> Result<Value, ConvertError> {
        struct_from_json(&self.projector, self.name, self.fields, json, self.name)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RUN-TIME OPERATIONS (shared with enum variants that carry named fields)
// ————————————————————————————————————————————————————————————————————————————

pub(crate) fn decode_members(
    p: &Projector<'_>,
    members: &[IdlField],
    decoded: &Decoded,
    path: &str,
) -> Result<IndexMap<String, Value>, ConvertError> {
    let record = decoded.to_struct().map_err(|e| e.within(path))?;
    let mut out = IndexMap::with_capacity(members.len());
    for f in members {
        let at = at_field(path, &f.name);
        let item = record
            .get(&f.name)
            .ok_or_else(|| ConvertError::mismatch(&at, format!("field `{}`", f.name), "nothing"))?;
        out.insert(f.name.clone(), p.from_decoded(&f.ty, item, &at)?);
    }
    Ok(out)
}

pub(crate) fn encode_members(
    p: &Projector<'_>,
    members: &[IdlField],
    values: &IndexMap<String, Value>,
    path: &str,
) -> Result<IndexMap<String, Decoded>, ConvertError> {
    if let Some(extra) = values.keys().find(|k| !members.iter().any(|f| &f.name == *k)) {
        return Err(ConvertError::mismatch(at_field(path, extra), "no such field", "a value"));
    }
    let mut out = IndexMap::with_capacity(members.len());
    for f in members {
        let at = at_field(path, &f.name);
        let value = values
            .get(&f.name)
            .ok_or_else(|| ConvertError::mismatch(&at, format!("field `{}`", f.name), "nothing"))?;
        out.insert(f.name.clone(), p.to_encodable(&f.ty, value, &at)?);
    }
    Ok(out)
}

pub(crate) fn json_members(
    p: &Projector<'_>,
    members: &[IdlField],
    values: &IndexMap<String, Value>,
    path: &str,
) -> Result<serde_json::Map<String, Json>, ConvertError> {
    let mut out = serde_json::Map::with_capacity(members.len());
    for f in members {
        let at = at_field(path, &f.name);
        let value = values
            .get(&f.name)
            .ok_or_else(|| ConvertError::mismatch(&at, format!("field `{}`", f.name), "nothing"))?;
        out.insert(f.name.clone(), p.to_json(&f.ty, value, &at)?);
    }
    Ok(out)
}

fn struct_value<'v>(name: &str, value: &'v Value, path: &str) -> Result<&'v StructValue, ConvertError> {
    match value {
        Value::Struct(s) if s.type_name == name => Ok(s),
        Value::Struct(s) => Err(ConvertError::mismatch(path, format!("struct {name}"), format!("struct {}", s.type_name))),
        other => Err(ConvertError::mismatch(path, format!("struct {name}"), other.kind_name())),
    }
}

pub(crate) fn decode_struct(
    p: &Projector<'_>,
    name: &str,
    fields: &[IdlField],
    decoded: &Decoded,
    path: &str,
) -> Result<Value, ConvertError> {
    Ok(Value::Struct(StructValue {
        type_name: name.to_string(),
        fields: decode_members(p, fields, decoded, path)?,
    }))
}

pub(crate) fn encode_struct(
    p: &Projector<'_>,
    name: &str,
    fields: &[IdlField],
    value: &Value,
    path: &str,
) -> Result<Decoded, ConvertError> {
    let s = struct_value(name, value, path)?;
    Ok(Decoded::Struct(encode_members(p, fields, &s.fields, path)?))
}

pub(crate) fn struct_to_json(
    p: &Projector<'_>,
    name: &str,
    fields: &[IdlField],
    value: &Value,
    path: &str,
) -> Result<Json, ConvertError> {
    let s = struct_value(name, value, path)?;
    Ok(Json::Object(json_members(p, fields, &s.fields, path)?))
}

pub(crate) fn struct_from_json(
    p: &Projector<'_>,
    name: &str,
    fields: &[IdlField],
    json: &Json,
    path: &str,
) -> Result<Value, ConvertError> {
    let object = json
        .as_object()
        .ok_or_else(|| ConvertError::mismatch(path, format!("object for {name}"), json_kind(json)))?;
    let members = fields.iter().map(|f| (f.name.as_str(), &f.ty));
    Ok(Value::Struct(StructValue {
        type_name: name.to_string(),
        fields: p.json_members(members, object, path)?,
    }))
}

// ————————————————————————————————————————————————————————————————————————————
// RENDERING
// ————————————————————————————————————————————————————————————————————————————

/// Rust identifiers for named members; two IDL names may not collapse onto one.
pub(crate) fn member_idents<'f>(scope: &str, members: &'f [IdlField]) -> Result<Vec<(String, &'f IdlField)>, GenError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(members.len());
    for f in members {
        let ident = field_ident(&f.name);
        if !seen.insert(ident.clone()) {
            return Err(GenError::DuplicateField { type_name: scope.to_string(), field: f.name.clone() });
        }
        out.push((ident, f));
    }
    Ok(out)
}

impl StructBundle<'_> {
    pub(crate) fn render(&self, cg: &mut Codegen) -> Result<(), GenError> {
        let p = &self.projector;
        let owner = self.name;
        let stem = to_pascal_case(owner);
        let ident = type_ident(owner);
        let members = member_idents(owner, self.fields)?;
        let empty = members.is_empty();

        cg.line(format!("/// Field record accepted by [`{ident}::new`]."));
        cg.line("#[derive(Debug, Clone, PartialEq)]");
        cg.block(format!("pub struct {stem}Fields"), |cg| {
            for (id, f) in &members {
                cg.line(format!("pub {id}: {},", p.value_type(owner, &f.ty, Form::Fields)));
            }
        });
        cg.blank();

        cg.line("#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]");
        cg.block(format!("pub struct {stem}Json"), |cg| {
            for (id, f) in &members {
                rename_attr(cg, id, &f.name);
                cg.line(format!("pub {id}: {},", p.json_type(owner, &f.ty)));
            }
        });
        cg.blank();

        cg.line("#[derive(Debug, Clone, PartialEq)]");
        cg.block(format!("pub struct {ident}"), |cg| {
            for (id, f) in &members {
                cg.line(format!("pub {id}: {},", p.value_type(owner, &f.ty, Form::Instance)));
            }
        });
        cg.blank();

        cg.block(format!("impl {ident}"), |cg| {
            cg.block("pub fn layout() -> Layout", |cg| cg.line(self.layout.to_rust()));
            cg.blank();

            let arg = if empty { "_fields" } else { "fields" };
            cg.block(format!("pub fn new({arg}: {stem}Fields) -> Self"), |cg| {
                cg.block("Self", |cg| {
                    for (id, f) in &members {
                        cg.line(format!("{id}: {},", p.initializer_expr(owner, &f.ty, &format!("fields.{id}"))));
                    }
                });
            });
            cg.blank();

            cg.block("pub fn from_decoded(obj: &Decoded) -> Result<Self, ConvertError>", |cg| {
                if empty {
                    cg.line("obj.to_struct()?;");
                }
                cg.open("Ok(Self");
                for (id, f) in &members {
                    cg.line(format!(
                        "{id}: runtime::field(obj, {:?}, |v| {})?,",
                        f.name,
                        p.from_decoded_expr(owner, &f.ty, "v")
                    ));
                }
                cg.close(")");
            });
            cg.blank();

            for (signature, src, form) in [
                (format!("pub fn to_encodable({arg}: &{stem}Fields) -> Decoded"), "&fields", Form::Fields),
                ("pub fn encodable(&self) -> Decoded".to_string(), "&self", Form::Instance),
            ] {
                cg.block(signature, |cg| {
                    if empty {
                        cg.line("Decoded::empty()");
                        return;
                    }
                    cg.indent("Decoded::structure([");
                    for (id, f) in &members {
                        let expr = p.to_encodable_expr(owner, &f.ty, &format!("{src}.{id}"), form);
                        cg.line(format!("({:?}, {expr}),", f.name));
                    }
                    cg.dedent("])");
                });
                cg.blank();
            }

            cg.block(format!("pub fn to_json(&self) -> {stem}Json"), |cg| {
                cg.block(format!("{stem}Json"), |cg| {
                    for (id, f) in &members {
                        cg.line(format!("{id}: {},", p.to_json_expr(owner, &f.ty, &format!("&self.{id}"))));
                    }
                });
            });
            cg.blank();

            let obj = if empty { "_obj" } else { "obj" };
            cg.block(format!("pub fn from_json({obj}: &{stem}Json) -> Result<Self, ConvertError>"), |cg| {
                cg.open("Ok(Self");
                for (id, f) in &members {
                    let expr = p.from_json_expr(owner, &f.ty, &format!("&obj.{id}"));
                    cg.line(format!("{id}: {},", expr.unwrap_within(&f.name)));
                }
                cg.close(")");
            });
            cg.blank();

            cg.block("pub fn encode(&self) -> Result<Vec<u8>, CodecError>", |cg| {
                cg.line("Self::layout().encode(&self.encodable(), super::registry())");
            });
            cg.blank();

            cg.block("pub fn decode(bytes: &[u8]) -> Result<Self, runtime::Error>", |cg| {
                cg.line("let decoded = Self::layout().parse(bytes, super::registry())?;");
                cg.line("Ok(Self::from_decoded(&decoded)?)");
            });
        });
        Ok(())
    }
}
