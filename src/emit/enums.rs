//! Enum bundles: one variant type per declared variant, a kind union over
//! them, and the parallel JSON union.
use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::codec::Decoded;
use crate::codegen::{Codegen, field_ident, to_pascal_case, type_ident};
use crate::error::{ConvertError, GenError};
use crate::idl::{IdlEnumVariant, IdlType, VariantShape};
use crate::layout::Layout;
use crate::project::{Form, Projector, at_field, json_kind};
use crate::runtime;
use crate::value::{EnumValue, Payload, Value};

use super::rename_attr;
use super::structs::{decode_members, encode_members, json_members, member_idents};

#[derive(Debug, Clone, Copy)]
pub struct VariantInfo<'a> {
    pub name: &'a str,
    pub discriminator: u8,
    pub shape: VariantShape<'a>,
}

#[derive(Debug)]
pub struct EnumBundle<'a> {
    projector: Projector<'a>,
    name: &'a str,
    variants: &'a [IdlEnumVariant],
    layout: Layout,
}

fn info(index: usize, variant: &IdlEnumVariant) -> VariantInfo<'_> {
    VariantInfo {
        name: &variant.name,
        // the table caps enums at 256 variants
        discriminator: index as u8,
        shape: variant.shape(),
    }
}

impl<'a> EnumBundle<'a> {
    pub fn new(projector: Projector<'a>, name: &'a str, variants: &'a [IdlEnumVariant], layout: Layout) -> Self {
        EnumBundle { projector, name, variants, layout }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Variants in declaration (= discriminant) order.
    pub fn variants(&self) -> impl Iterator<Item = VariantInfo<'a>> + '_ {
        self.variants.iter().enumerate().map(|(i, v)| info(i, v))
    }

    /// Exact, declaration-order lookup of a variant by kind.
    pub fn variant(&self, kind: &str) -> Result<VariantInfo<'a>, ConvertError> {
        find_variant(self.name, self.variants, kind).map(|(i, v)| info(i, v))
    }

    pub fn construct(&self, kind: &str, payload: Payload) -> Result<Value, ConvertError> {
        let variant = self.variant(kind)?;
        let value = Value::Enum(EnumValue {
            type_name: self.name.to_string(),
            kind: variant.name.to_string(),
            discriminator: variant.discriminator,
            payload,
        });
        self.to_encodable(&value)?;
        Ok(value)
    }

    pub fn discriminator(&self, value: &Value) -> Result<u8, ConvertError> {
        let (index, _, _) = enum_value(self.name, self.variants, value, self.name)?;
        Ok(index as u8)
    }

    pub fn kind<'v>(&self, value: &'v Value) -> Result<&'v str, ConvertError> {
        let (_, _, ev) = enum_value(self.name, self.variants, value, self.name)?;
        Ok(&ev.kind)
    }

    pub fn from_decoded(&self, decoded: &Decoded) -> Result<Value, ConvertError> {
        decode_enum(&self.projector, self.name, self.variants, decoded, self.name)
    }

    pub fn to_encodable(&self, value: &Value) -> Result<Decoded, ConvertError> {
        encode_enum(&self.projector, self.name, self.variants, value, self.name)
    }

    pub fn to_json(&self, value: &Value) -> Result<Json, ConvertError> {
        enum_to_json(&self.projector, self.name, self.variants, value, self.name)
    }

    pub fn from_json(&self, json: &Json) -> Result<Value, ConvertError> {
        enum_from_json(&self.projector, self.name, self.variants, json, self.name)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RUN-TIME OPERATIONS
// ————————————————————————————————————————————————————————————————————————————

fn find_variant<'v>(
    enum_name: &str,
    variants: &'v [IdlEnumVariant],
    kind: &str,
) -> Result<(usize, &'v IdlEnumVariant), ConvertError> {
    variants
        .iter()
        .enumerate()
        .find(|(_, v)| v.name == kind)
        .ok_or_else(|| ConvertError::UnrecognizedKind {
            enum_name: enum_name.to_string(),
            kind: kind.to_string(),
        })
}

/// Checks type name, kind and discriminator of an enum value.
fn enum_value<'v, 'd>(
    name: &str,
    variants: &'d [IdlEnumVariant],
    value: &'v Value,
    path: &str,
) -> Result<(usize, &'d IdlEnumVariant, &'v EnumValue), ConvertError> {
    let ev = match value {
        Value::Enum(ev) if ev.type_name == name => ev,
        Value::Enum(ev) => {
            return Err(ConvertError::mismatch(path, format!("enum {name}"), format!("enum {}", ev.type_name)));
        }
        other => return Err(ConvertError::mismatch(path, format!("enum {name}"), other.kind_name())),
    };
    let (index, variant) = find_variant(name, variants, &ev.kind)?;
    if usize::from(ev.discriminator) != index {
        return Err(ConvertError::mismatch(
            path,
            format!("discriminator {index} for `{}`", ev.kind),
            ev.discriminator.to_string(),
        ));
    }
    Ok((index, variant, ev))
}

fn shape_name(shape: VariantShape<'_>) -> &'static str {
    match shape {
        VariantShape::Empty => "empty payload",
        VariantShape::Named(_) => "named payload",
        VariantShape::Tuple(_) => "tuple payload",
    }
}

fn payload_name(payload: &Payload) -> &'static str {
    match payload {
        Payload::Empty => "empty payload",
        Payload::Named(_) => "named payload",
        Payload::Tuple(_) => "tuple payload",
    }
}

fn tuple_key(i: usize) -> String {
    format!("_{i}")
}

fn check_arity(types: &[IdlType], len: usize, path: &str) -> Result<(), ConvertError> {
    if types.len() == len {
        Ok(())
    } else {
        Err(ConvertError::mismatch(path, format!("{} elements", types.len()), format!("{len} elements")))
    }
}

pub(crate) fn decode_enum(
    p: &Projector<'_>,
    name: &str,
    variants: &[IdlEnumVariant],
    decoded: &Decoded,
    path: &str,
) -> Result<Value, ConvertError> {
    runtime::check_single_variant(decoded, name)?;
    // declaration order, first match wins
    for (index, variant) in variants.iter().enumerate() {
        let Some(payload) = decoded.variant(&variant.name) else { continue };
        let at = at_field(path, &variant.name);
        let payload = match variant.shape() {
            VariantShape::Empty => {
                payload.to_struct().map_err(|e| e.within(&at))?;
                Payload::Empty
            }
            VariantShape::Named(fields) => Payload::Named(decode_members(p, fields, payload, &at)?),
            VariantShape::Tuple(types) => {
                let record = payload.to_struct().map_err(|e| e.within(&at))?;
                let mut items = Vec::with_capacity(types.len());
                for (i, ty) in types.iter().enumerate() {
                    let key = tuple_key(i);
                    let item_at = at_field(&at, &key);
                    let item = record
                        .get(&key)
                        .ok_or_else(|| ConvertError::mismatch(&item_at, format!("field `{key}`"), "nothing"))?;
                    items.push(p.from_decoded(ty, item, &item_at)?);
                }
                Payload::Tuple(items)
            }
        };
        return Ok(Value::Enum(EnumValue {
            type_name: name.to_string(),
            kind: variant.name.clone(),
            discriminator: info(index, variant).discriminator,
            payload,
        }));
    }
    Err(runtime::no_variant_matched(decoded, name))
}

pub(crate) fn encode_enum(
    p: &Projector<'_>,
    name: &str,
    variants: &[IdlEnumVariant],
    value: &Value,
    path: &str,
) -> Result<Decoded, ConvertError> {
    let (_, variant, ev) = enum_value(name, variants, value, path)?;
    let at = at_field(path, &variant.name);
    let payload = match (variant.shape(), &ev.payload) {
        (VariantShape::Empty, Payload::Empty) => Decoded::empty(),
        (VariantShape::Named(fields), Payload::Named(values)) => Decoded::Struct(encode_members(p, fields, values, &at)?),
        (VariantShape::Tuple(types), Payload::Tuple(values)) => {
            check_arity(types, values.len(), &at)?;
            let mut record = IndexMap::with_capacity(types.len());
            for (i, (ty, item)) in types.iter().zip(values).enumerate() {
                let key = tuple_key(i);
                let encoded = p.to_encodable(ty, item, &at_field(&at, &key))?;
                record.insert(key, encoded);
            }
            Decoded::Struct(record)
        }
        (shape, payload) => return Err(ConvertError::mismatch(at, shape_name(shape), payload_name(payload))),
    };
    Ok(Decoded::variant_of(&variant.name, payload))
}

pub(crate) fn enum_to_json(
    p: &Projector<'_>,
    name: &str,
    variants: &[IdlEnumVariant],
    value: &Value,
    path: &str,
) -> Result<Json, ConvertError> {
    let (_, variant, ev) = enum_value(name, variants, value, path)?;
    let at = at_field(path, &variant.name);
    let mut out = serde_json::Map::new();
    out.insert("kind".to_string(), Json::String(variant.name.clone()));
    match (variant.shape(), &ev.payload) {
        (VariantShape::Empty, Payload::Empty) => {}
        (VariantShape::Named(fields), Payload::Named(values)) => {
            out.insert("value".to_string(), Json::Object(json_members(p, fields, values, &at)?));
        }
        (VariantShape::Tuple(types), Payload::Tuple(values)) => {
            check_arity(types, values.len(), &at)?;
            let items = types
                .iter()
                .zip(values)
                .enumerate()
                .map(|(i, (ty, item))| p.to_json(ty, item, &at_field(&at, &tuple_key(i))))
                .collect::<Result<Vec<_>, _>>()?;
            out.insert("value".to_string(), Json::Array(items));
        }
        (shape, payload) => return Err(ConvertError::mismatch(at, shape_name(shape), payload_name(payload))),
    }
    Ok(Json::Object(out))
}

pub(crate) fn enum_from_json(
    p: &Projector<'_>,
    name: &str,
    variants: &[IdlEnumVariant],
    json: &Json,
    path: &str,
) -> Result<Value, ConvertError> {
    let object = json
        .as_object()
        .ok_or_else(|| ConvertError::mismatch(path, format!("{{\"kind\": ...}} object for {name}"), json_kind(json)))?;
    let kind = match object.get("kind") {
        Some(Json::String(kind)) => kind,
        other => {
            let found = other.map(json_kind).unwrap_or("nothing");
            return Err(ConvertError::mismatch(at_field(path, "kind"), "variant name", found));
        }
    };
    let (index, variant) = find_variant(name, variants, kind)?;
    let at = at_field(path, &variant.name);
    let body = object.get("value");
    let found = || body.map(json_kind).unwrap_or("nothing");
    let payload = match variant.shape() {
        VariantShape::Empty => Payload::Empty,
        VariantShape::Named(fields) => {
            let members = body
                .and_then(Json::as_object)
                .ok_or_else(|| ConvertError::mismatch(&at, "object", found()))?;
            Payload::Named(p.json_members(fields.iter().map(|f| (f.name.as_str(), &f.ty)), members, &at)?)
        }
        VariantShape::Tuple(types) => {
            let items = body
                .and_then(Json::as_array)
                .ok_or_else(|| ConvertError::mismatch(&at, "array", found()))?;
            check_arity(types, items.len(), &at)?;
            let values = types
                .iter()
                .zip(items)
                .enumerate()
                .map(|(i, (ty, item))| p.from_json(ty, item, &at_field(&at, &tuple_key(i))))
                .collect::<Result<Vec<_>, _>>()?;
            Payload::Tuple(values)
        }
    };
    Ok(Value::Enum(EnumValue {
        type_name: name.to_string(),
        kind: variant.name.clone(),
        discriminator: info(index, variant).discriminator,
        payload,
    }))
}

// ————————————————————————————————————————————————————————————————————————————
// RENDERING
// ————————————————————————————————————————————————————————————————————————————

struct RenderedVariant<'v> {
    variant: &'v IdlEnumVariant,
    ident: String,
    discriminator: u8,
}

impl EnumBundle<'_> {
    fn rendered_variants(&self) -> Result<Vec<RenderedVariant<'_>>, GenError> {
        let stem = to_pascal_case(self.name);
        let reserved = [format!("{stem}Kind"), format!("{stem}Json")];
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(self.variants.len());
        for (i, variant) in self.variants.iter().enumerate() {
            let ident = type_ident(&variant.name);
            if reserved.contains(&ident) {
                return Err(GenError::InvalidIdentifier(format!("{}::{}", self.name, variant.name)));
            }
            if !seen.insert(ident.clone()) {
                return Err(GenError::DuplicateVariant {
                    enum_name: self.name.to_string(),
                    variant: variant.name.clone(),
                });
            }
            out.push(RenderedVariant { variant, ident, discriminator: info(i, variant).discriminator });
        }
        Ok(out)
    }

    pub(crate) fn render(&self, cg: &mut Codegen) -> Result<(), GenError> {
        let p = &self.projector;
        let owner = self.name;
        let stem = to_pascal_case(owner);
        let kind_enum = format!("{stem}Kind");
        let json_enum = format!("{stem}Json");
        let variants = self.rendered_variants()?;

        // ------- variant types ------- //
        for rv in &variants {
            let ident = &rv.ident;
            let scope = format!("{owner}::{}", rv.variant.name);
            cg.line("#[derive(Debug, Clone, PartialEq)]");
            match rv.variant.shape() {
                VariantShape::Empty => cg.line(format!("pub struct {ident};")),
                VariantShape::Named(fields) => {
                    let members = member_idents(&scope, fields)?;
                    cg.block(format!("pub struct {ident}"), |cg| {
                        for (id, f) in &members {
                            cg.line(format!("pub {id}: {},", p.value_type(owner, &f.ty, Form::Instance)));
                        }
                    });
                }
                VariantShape::Tuple(types) => {
                    let items = types
                        .iter()
                        .map(|ty| format!("pub {}", p.value_type(owner, ty, Form::Instance)))
                        .collect::<Vec<_>>();
                    cg.line(format!("pub struct {ident}({});", items.join(", ")));
                }
            }
            cg.blank();

            let mut failed = None;
            cg.block(format!("impl {ident}"), |cg| {
                cg.line(format!("pub const DISCRIMINATOR: u8 = {};", rv.discriminator));
                cg.line(format!("pub const KIND: &str = {:?};", rv.variant.name));
                cg.blank();
                if let Err(e) = self.render_variant_methods(cg, rv, &json_enum) {
                    failed = Some(e);
                }
            });
            if let Some(e) = failed {
                return Err(e);
            }
            cg.blank();
        }

        // ------- kind union ------- //
        cg.line("#[derive(Debug, Clone, PartialEq)]");
        cg.block(format!("pub enum {kind_enum}"), |cg| {
            for rv in &variants {
                cg.line(format!("{0}({0}),", rv.ident));
            }
        });
        cg.blank();

        let dispatch = |cg: &mut Codegen, arm: &dyn Fn(&RenderedVariant<'_>) -> String| {
            if variants.is_empty() {
                cg.line("match *self {}");
                return;
            }
            cg.block("match self", |cg| {
                for rv in &variants {
                    cg.line(arm(rv));
                }
            });
        };
        cg.block(format!("impl {kind_enum}"), |cg| {
            cg.block("pub fn discriminator(&self) -> u8", |cg| {
                dispatch(cg, &|rv: &RenderedVariant<'_>| format!("{kind_enum}::{0}(_) => {0}::DISCRIMINATOR,", rv.ident));
            });
            cg.blank();
            cg.block("pub fn kind(&self) -> &'static str", |cg| {
                dispatch(cg, &|rv: &RenderedVariant<'_>| format!("{kind_enum}::{0}(_) => {0}::KIND,", rv.ident));
            });
            cg.blank();
            cg.block(format!("pub fn to_json(&self) -> {json_enum}"), |cg| {
                dispatch(cg, &|rv: &RenderedVariant<'_>| format!("{kind_enum}::{}(value) => value.to_json(),", rv.ident));
            });
            cg.blank();
            cg.block("pub fn to_encodable(&self) -> Decoded", |cg| {
                dispatch(cg, &|rv: &RenderedVariant<'_>| format!("{kind_enum}::{}(value) => value.to_encodable(),", rv.ident));
            });
            cg.blank();
            cg.block("pub fn encode(&self) -> Result<Vec<u8>, CodecError>", |cg| {
                cg.line("layout().encode(&self.to_encodable(), super::registry())");
            });
            cg.blank();
            cg.block("pub fn decode(bytes: &[u8]) -> Result<Self, runtime::Error>", |cg| {
                cg.line("let decoded = layout().parse(bytes, super::registry())?;");
                cg.line("Ok(from_decoded(&decoded)?)");
            });
        });
        cg.blank();

        // ------- JSON union ------- //
        cg.line("#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]");
        if !variants.is_empty() {
            cg.line("#[serde(tag = \"kind\", content = \"value\")]");
        }
        let mut failed = None;
        cg.block(format!("pub enum {json_enum}"), |cg| {
            for rv in &variants {
                rename_attr(cg, &rv.ident, &rv.variant.name);
                match rv.variant.shape() {
                    VariantShape::Empty => cg.line(format!("{},", rv.ident)),
                    VariantShape::Named(fields) => {
                        let scope = format!("{owner}::{}", rv.variant.name);
                        let members = match member_idents(&scope, fields) {
                            Ok(m) => m,
                            Err(e) => {
                                failed = Some(e);
                                return;
                            }
                        };
                        cg.open(&rv.ident);
                        for (id, f) in &members {
                            rename_attr(cg, id, &f.name);
                            cg.line(format!("{id}: {},", p.json_type(owner, &f.ty)));
                        }
                        cg.close(",");
                    }
                    VariantShape::Tuple(types) => {
                        let items: String = types.iter().map(|ty| format!("{}, ", p.json_type(owner, ty))).collect();
                        cg.line(format!("{}(({})),", rv.ident, items.trim_end_matches(' ')));
                    }
                }
            }
        });
        if let Some(e) = failed {
            return Err(e);
        }
        cg.blank();

        // ------- module functions ------- //
        cg.block("pub fn layout() -> Layout", |cg| cg.line(self.layout.to_rust()));
        cg.blank();

        cg.block(format!("pub fn from_decoded(obj: &Decoded) -> Result<{kind_enum}, ConvertError>"), |cg| {
            cg.line(format!("runtime::check_single_variant(obj, {owner:?})?;"));
            for rv in &variants {
                let name = &rv.variant.name;
                let ident = &rv.ident;
                match rv.variant.shape() {
                    VariantShape::Empty => {
                        cg.block(format!("if let Some(val) = obj.variant({name:?})"), |cg| {
                            cg.line(format!("val.to_struct().map_err(|e| e.within({name:?}))?;"));
                            cg.line(format!("return Ok({kind_enum}::{ident}({ident}));"));
                        });
                    }
                    VariantShape::Named(fields) => {
                        cg.block(format!("if let Some(val) = obj.variant({name:?})"), |cg| {
                            cg.open(format!("return Ok({kind_enum}::{ident}({ident}"));
                            for f in fields {
                                cg.line(format!(
                                    "{}: runtime::field(val, {:?}, |v| {})?,",
                                    field_ident(&f.name),
                                    f.name,
                                    p.from_decoded_expr(owner, &f.ty, "v")
                                ));
                            }
                            cg.close("));");
                        });
                    }
                    VariantShape::Tuple(types) => {
                        let items = types
                            .iter()
                            .enumerate()
                            .map(|(i, ty)| {
                                format!("runtime::field(val, {:?}, |v| {})?", tuple_key(i), p.from_decoded_expr(owner, ty, "v"))
                            })
                            .collect::<Vec<_>>();
                        cg.block(format!("if let Some(val) = obj.variant({name:?})"), |cg| {
                            cg.line(format!("return Ok({kind_enum}::{ident}({ident}({})));", items.join(", ")));
                        });
                    }
                }
            }
            cg.line(format!("Err(runtime::no_variant_matched(obj, {owner:?}))"));
        });
        cg.blank();

        let obj = if variants.is_empty() { "_obj" } else { "obj" };
        cg.block(format!("pub fn from_json({obj}: &{json_enum}) -> Result<{kind_enum}, ConvertError>"), |cg| {
            if variants.is_empty() {
                cg.line("Ok(match *_obj {})");
                return;
            }
            cg.open("Ok(match obj");
            for rv in &variants {
                let ident = &rv.ident;
                let name = &rv.variant.name;
                match rv.variant.shape() {
                    VariantShape::Empty => cg.line(format!("{json_enum}::{ident} => {kind_enum}::{ident}({ident}),")),
                    VariantShape::Named(fields) => {
                        let bindings = fields
                            .iter()
                            .map(|f| field_ident(&f.name))
                            .collect::<Vec<_>>();
                        cg.open(format!(
                            "{json_enum}::{ident} {{ {} }} => {kind_enum}::{ident}({ident}",
                            bindings.join(", ")
                        ));
                        for (f, binding) in fields.iter().zip(&bindings) {
                            let expr = p.from_json_expr(owner, &f.ty, binding);
                            cg.line(format!("{binding}: {},", expr.unwrap_within(&format!("{name}.{}", f.name))));
                        }
                        cg.close("),");
                    }
                    VariantShape::Tuple(types) => {
                        let bindings = (0..types.len()).map(|i| format!("f{i}")).collect::<Vec<_>>();
                        let items = types
                            .iter()
                            .zip(&bindings)
                            .enumerate()
                            .map(|(i, (ty, binding))| {
                                p.from_json_expr(owner, ty, binding).unwrap_within(&format!("{name}.{}", tuple_key(i)))
                            })
                            .collect::<Vec<_>>();
                        cg.line(format!(
                            "{json_enum}::{ident}(({})) => {kind_enum}::{ident}({ident}({})),",
                            bindings.join(", ") + if bindings.len() == 1 { "," } else { "" },
                            items.join(", ")
                        ));
                    }
                }
            }
            cg.close(")");
        });
        Ok(())
    }

    fn render_variant_methods(&self, cg: &mut Codegen, rv: &RenderedVariant<'_>, json_enum: &str) -> Result<(), GenError> {
        let p = &self.projector;
        let owner = self.name;
        let ident = &rv.ident;
        match rv.variant.shape() {
            VariantShape::Empty => {
                cg.block(format!("pub fn to_json(&self) -> {json_enum}"), |cg| {
                    cg.line(format!("{json_enum}::{ident}"));
                });
                cg.blank();
                cg.block("pub fn to_encodable(&self) -> Decoded", |cg| {
                    cg.line("Decoded::variant_of(Self::KIND, Decoded::empty())");
                });
            }
            VariantShape::Named(fields) => {
                let members = member_idents(&format!("{owner}::{}", rv.variant.name), fields)?;
                cg.block(format!("pub fn to_json(&self) -> {json_enum}"), |cg| {
                    cg.block(format!("{json_enum}::{ident}"), |cg| {
                        for (id, f) in &members {
                            cg.line(format!("{id}: {},", p.to_json_expr(owner, &f.ty, &format!("&self.{id}"))));
                        }
                    });
                });
                cg.blank();
                cg.block("pub fn to_encodable(&self) -> Decoded", |cg| {
                    cg.indent("Decoded::variant_of(Self::KIND, Decoded::structure([");
                    for (id, f) in &members {
                        let expr = p.to_encodable_expr(owner, &f.ty, &format!("&self.{id}"), Form::Instance);
                        cg.line(format!("({:?}, {expr}),", f.name));
                    }
                    cg.dedent("]))");
                });
            }
            VariantShape::Tuple(types) => {
                let json_items: String = types
                    .iter()
                    .enumerate()
                    .map(|(i, ty)| format!("{}, ", p.to_json_expr(owner, ty, &format!("&self.{i}"))))
                    .collect();
                cg.block(format!("pub fn to_json(&self) -> {json_enum}"), |cg| {
                    cg.line(format!("{json_enum}::{ident}(({}))", json_items.trim_end_matches(' ')));
                });
                cg.blank();
                cg.block("pub fn to_encodable(&self) -> Decoded", |cg| {
                    cg.indent("Decoded::variant_of(Self::KIND, Decoded::structure([");
                    for (i, ty) in types.iter().enumerate() {
                        let expr = p.to_encodable_expr(owner, ty, &format!("&self.{i}"), Form::Instance);
                        cg.line(format!("({:?}, {expr}),", tuple_key(i)));
                    }
                    cg.dedent("]))");
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::TypeBundle;
    use crate::idl::Idl;
    use crate::module::GeneratorConfig;
    use crate::resolve::TypeTable;

    fn table() -> TypeTable {
        let idl = Idl::from_json_str(r#"{ "types": [
            { "name": "Shape", "type": { "kind": "enum", "variants": [
                { "name": "Circle", "fields": [ { "name": "radius", "type": "f64" } ] },
                { "name": "Unit" },
                { "name": "Pair", "fields": [ "u8", "i64" ] }
            ] } }
        ] }"#).unwrap();
        TypeTable::from_idl(&idl).unwrap()
    }

    fn shapes(t: &TypeTable) -> EnumBundle<'_> {
        match TypeBundle::new(t, "Shape").unwrap() {
            TypeBundle::Enum(b) => b,
            TypeBundle::Struct(_) => panic!("expected enum"),
        }
    }

    #[test]
    fn discriminants_follow_declaration_order() {
        let t = table();
        let b = shapes(&t);
        let seen: Vec<(&str, u8)> = b.variants().map(|v| (v.name, v.discriminator)).collect();
        assert_eq!(seen, [("Circle", 0), ("Unit", 1), ("Pair", 2)]);
        let unit = b.construct("Unit", Payload::Empty).unwrap();
        assert_eq!(b.discriminator(&unit).unwrap(), 1);
        assert_eq!(b.kind(&unit).unwrap(), "Unit");
    }

    #[test]
    fn decoded_dispatch_is_exact() {
        let t = table();
        let b = shapes(&t);
        let unit = b.from_decoded(&Decoded::variant_of("Unit", Decoded::empty())).unwrap();
        assert!(matches!(&unit, Value::Enum(ev) if ev.kind == "Unit" && ev.payload == Payload::Empty));

        let circle = Decoded::variant_of("Circle", Decoded::structure([("radius", Decoded::Float(2.0))]));
        let Value::Enum(ev) = b.from_decoded(&circle).unwrap() else { panic!() };
        assert_eq!(ev.kind, "Circle");
        assert_eq!(ev.payload, Payload::Named(IndexMap::from([("radius".to_string(), Value::float(2.0))])));

        assert!(matches!(b.from_decoded(&Decoded::empty()), Err(ConvertError::InvalidEnum { .. })));
        let unknown = Decoded::variant_of("Square", Decoded::empty());
        assert!(matches!(b.from_decoded(&unknown), Err(ConvertError::InvalidEnum { .. })));
    }

    #[test]
    fn json_dispatch_reports_unknown_kinds() {
        let t = table();
        let b = shapes(&t);
        let pair = b.from_json(&serde_json::json!({ "kind": "Pair", "value": [1, "-9"] })).unwrap();
        assert_eq!(b.to_json(&pair).unwrap(), serde_json::json!({ "kind": "Pair", "value": [1, "-9"] }));
        assert_eq!(
            b.from_json(&serde_json::json!({ "kind": "Square" })).unwrap_err(),
            ConvertError::UnrecognizedKind { enum_name: "Shape".into(), kind: "Square".into() }
        );
        assert!(b.from_json(&serde_json::json!({ "kind": "Pair", "value": [1] })).is_err());
        assert_eq!(b.to_json(&b.construct("Unit", Payload::Empty).unwrap()).unwrap(), serde_json::json!({ "kind": "Unit" }));
    }

    #[test]
    fn payload_shape_must_match_variant() {
        let t = table();
        let b = shapes(&t);
        assert!(b.construct("Unit", Payload::Tuple(vec![])).is_err());
        assert!(b.construct("Pair", Payload::Tuple(vec![Value::Unsigned(1), Value::Signed(-1)])).is_ok());
        assert!(b.construct("Pair", Payload::Tuple(vec![Value::Unsigned(1)])).is_err());
    }

    #[test]
    fn renders_variant_types_and_unions() {
        let t = table();
        let src = TypeBundle::new(&t, "Shape").unwrap().render(&GeneratorConfig::default()).unwrap();
        for needle in [
            "pub struct Circle {\n    pub radius: f64,\n}",
            "pub struct Unit;",
            "pub struct Pair(pub u8, pub i64);",
            "pub const DISCRIMINATOR: u8 = 2;",
            "pub enum ShapeKind {\n    Circle(Circle),\n    Unit(Unit),\n    Pair(Pair),\n}",
            "#[serde(tag = \"kind\", content = \"value\")]",
            "    Pair((u8, String,)),",
            "ShapeJson::Pair((self.0, self.1.to_string(),))",
            "return Ok(ShapeKind::Pair(Pair(runtime::field(val, \"_0\", |v| v.to_u8())?, runtime::field(val, \"_1\", |v| v.to_i64())?)));",
            "ShapeJson::Pair((f0, f1)) => ShapeKind::Pair(Pair(*f0, runtime::parse_wide(f1).map_err(|e| e.within(\"Pair._1\"))?)),",
            "Err(runtime::no_variant_matched(obj, \"Shape\"))",
        ] {
            assert!(src.contains(needle), "missing {needle:?} in\n{src}");
        }
    }
}
