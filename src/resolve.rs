//! Type reference resolution over a name-keyed definition table.
//!
//! The table is built once per run, validated up front (identifiers, duplicates,
//! dangling references, direct self-containment) and then only read.
use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::GenError;
use crate::idl::{Idl, IdlType, IdlTypeDef, IdlTypeDefTy, VariantShape};

static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// One-byte discriminants.
pub const MAX_VARIANTS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinedKind {
    Struct,
    Enum,
}

/// Kind tag for a field type expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Primitive,
    Container,
    Defined(DefinedKind),
}

#[derive(Debug, Clone)]
pub struct TypeTable {
    defs: IndexMap<String, IdlTypeDef>,
    // every definition reachable from the key through any reference
    reach: HashMap<String, HashSet<String>>,
}

/// A field position inside a definition, used for edges and error context.
struct FieldRef<'a> {
    field: String,
    ty: &'a IdlType,
}

fn field_refs(def: &IdlTypeDef) -> Vec<FieldRef<'_>> {
    match &def.ty {
        IdlTypeDefTy::Struct { fields } => fields
            .iter()
            .map(|f| FieldRef { field: f.name.clone(), ty: &f.ty })
            .collect(),
        IdlTypeDefTy::Enum { variants } => {
            let mut out = Vec::new();
            for variant in variants {
                match variant.shape() {
                    VariantShape::Empty => {}
                    VariantShape::Named(fields) => {
                        for f in fields {
                            out.push(FieldRef { field: format!("{}.{}", variant.name, f.name), ty: &f.ty });
                        }
                    }
                    VariantShape::Tuple(types) => {
                        for (i, ty) in types.iter().enumerate() {
                            out.push(FieldRef { field: format!("{}._{i}", variant.name), ty });
                        }
                    }
                }
            }
            out
        }
    }
}

/// Defined names referenced by `ty`. `direct_only` stops at heap/optional
/// indirection (vec, option, hash map), leaving only by-value containment.
fn referenced_names<'a>(ty: &'a IdlType, direct_only: bool, out: &mut Vec<&'a str>) {
    match ty {
        IdlType::Defined(name) => out.push(name),
        IdlType::Array(inner, _) => referenced_names(inner, direct_only, out),
        IdlType::Vec(inner) | IdlType::Option(inner) => {
            if !direct_only {
                referenced_names(inner, direct_only, out);
            }
        }
        IdlType::HashMap(k, v) => {
            if !direct_only {
                referenced_names(k, direct_only, out);
                referenced_names(v, direct_only, out);
            }
        }
        _ => {}
    }
}

fn check_ident(name: &str) -> Result<(), GenError> {
    if IDENT.is_match(name) {
        Ok(())
    } else {
        Err(GenError::InvalidIdentifier(name.to_string()))
    }
}

impl TypeTable {
    pub fn from_idl(idl: &Idl) -> Result<Self, GenError> {
        Self::new(idl.types.clone())
    }

    pub fn new(types: Vec<IdlTypeDef>) -> Result<Self, GenError> {
        let mut defs = IndexMap::with_capacity(types.len());
        for def in types {
            check_ident(&def.name)?;
            validate_members(&def)?;
            if defs.contains_key(&def.name) {
                return Err(GenError::DuplicateType(def.name));
            }
            defs.insert(def.name.clone(), def);
        }

        // dangling references
        for def in defs.values() {
            for fref in field_refs(def) {
                let mut names = Vec::new();
                referenced_names(fref.ty, false, &mut names);
                if let Some(missing) = names.into_iter().find(|n| !defs.contains_key(*n)) {
                    return Err(GenError::Reference {
                        type_name: def.name.clone(),
                        field: fref.field,
                        missing: missing.to_string(),
                    });
                }
            }
        }

        let mut table = TypeTable { defs, reach: HashMap::new() };
        table.reject_direct_cycles()?;
        table.reach = table.compute_reach();
        tracing::debug!(types = table.defs.len(), "type table built");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definitions in declaration order.
    pub fn defs(&self) -> impl Iterator<Item = &IdlTypeDef> {
        self.defs.values()
    }

    pub fn get(&self, name: &str) -> Result<&IdlTypeDef, GenError> {
        self.defs.get(name).ok_or_else(|| GenError::UnknownType(name.to_string()))
    }

    pub fn kind_of(&self, name: &str) -> Result<DefinedKind, GenError> {
        Ok(match self.get(name)?.ty {
            IdlTypeDefTy::Struct { .. } => DefinedKind::Struct,
            IdlTypeDefTy::Enum { .. } => DefinedKind::Enum,
        })
    }

    pub fn resolve(&self, ty: &IdlType) -> Result<TypeKind, GenError> {
        Ok(match ty {
            IdlType::Defined(name) => TypeKind::Defined(self.kind_of(name)?),
            IdlType::Vec(_) | IdlType::Option(_) | IdlType::Array(..) | IdlType::HashMap(..) => {
                TypeKind::Container
            }
            _ => TypeKind::Primitive,
        })
    }

    /// True when `to` can be reached from `from` through any chain of references.
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        self.reach.get(from).is_some_and(|set| set.contains(to))
    }

    /// An optional reference from `owner` to `target` closes a cycle and needs a box.
    pub fn needs_indirection(&self, owner: &str, target: &str) -> bool {
        owner == target || self.reaches(target, owner)
    }

    fn edges(&self, name: &str, direct_only: bool) -> Vec<&str> {
        let Some(def) = self.defs.get(name) else { return Vec::new() };
        let mut out = Vec::new();
        for fref in field_refs(def) {
            referenced_names(fref.ty, direct_only, &mut out);
        }
        out
    }

    fn reject_direct_cycles(&self) -> Result<(), GenError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark { Fresh, Active, Done }

        fn visit<'a>(
            table: &'a TypeTable,
            name: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Result<(), GenError> {
            match marks.get(name).copied().unwrap_or(Mark::Fresh) {
                Mark::Done => return Ok(()),
                Mark::Active => {
                    let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                    let mut cycle: Vec<&str> = stack[start..].to_vec();
                    cycle.push(name);
                    return Err(GenError::UnboundedRecursion {
                        type_name: name.to_string(),
                        cycle: cycle.join(" -> "),
                    });
                }
                Mark::Fresh => {}
            }
            marks.insert(name, Mark::Active);
            stack.push(name);
            for next in table.edges(name, true) {
                visit(table, next, marks, stack)?;
            }
            stack.pop();
            marks.insert(name, Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        for name in self.defs.keys() {
            visit(self, name, &mut marks, &mut Vec::new())?;
        }
        Ok(())
    }

    fn compute_reach(&self) -> HashMap<String, HashSet<String>> {
        let mut out = HashMap::with_capacity(self.defs.len());
        for name in self.defs.keys() {
            let mut seen: HashSet<String> = HashSet::new();
            let mut todo: Vec<&str> = self.edges(name, false);
            while let Some(next) = todo.pop() {
                if seen.insert(next.to_string()) {
                    todo.extend(self.edges(next, false));
                }
            }
            out.insert(name.clone(), seen);
        }
        out
    }
}

fn validate_members(def: &IdlTypeDef) -> Result<(), GenError> {
    fn unique_fields<'a>(
        type_name: &str,
        names: impl Iterator<Item = &'a str>,
    ) -> Result<(), GenError> {
        let mut seen = HashSet::new();
        for name in names {
            check_ident(name)?;
            if !seen.insert(name) {
                return Err(GenError::DuplicateField {
                    type_name: type_name.to_string(),
                    field: name.to_string(),
                });
            }
        }
        Ok(())
    }

    match &def.ty {
        IdlTypeDefTy::Struct { fields } => {
            unique_fields(&def.name, fields.iter().map(|f| f.name.as_str()))
        }
        IdlTypeDefTy::Enum { variants } => {
            if variants.len() > MAX_VARIANTS {
                return Err(GenError::TooManyVariants {
                    enum_name: def.name.clone(),
                    count: variants.len(),
                });
            }
            let mut seen = HashSet::new();
            for variant in variants {
                check_ident(&variant.name)?;
                if !seen.insert(variant.name.as_str()) {
                    return Err(GenError::DuplicateVariant {
                        enum_name: def.name.clone(),
                        variant: variant.name.clone(),
                    });
                }
                if let VariantShape::Named(fields) = variant.shape() {
                    let scope = format!("{}::{}", def.name, variant.name);
                    unique_fields(&scope, fields.iter().map(|f| f.name.as_str()))?;
                }
            }
            Ok(())
        }
    }
}
