//! Module assembly: one rendered module per type, plus the index module that
//! declares them, re-exports their items and owns the layout registry.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::codegen::{Codegen, field_ident, module_file_stem, to_pascal_case, type_ident};
use crate::emit::TypeBundle;
use crate::error::GenError;
use crate::idl::{Idl, IdlTypeDef, IdlTypeDefTy};
use crate::layout::LayoutRegistry;
use crate::resolve::TypeTable;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Rendering options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Path rendered modules import the runtime surface from.
    pub runtime_path: String,
    /// Render modules on the rayon pool.
    pub parallel: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            runtime_path: "idl_typegen::runtime".to_string(),
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedModule {
    /// IDL type name.
    pub type_name: String,
    /// Rust module identifier (`r#type` for a type named `type`).
    pub module: String,
    pub file_name: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedModules {
    /// Declaration order.
    pub modules: Vec<RenderedModule>,
    /// `mod.rs` contents.
    pub index: String,
}

/// Owns the validated definition table and the layout registry built from it.
#[derive(Debug, Clone)]
pub struct Generator {
    table: TypeTable,
    registry: LayoutRegistry,
    config: GeneratorConfig,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl RenderedModules {
    /// Write `mod.rs` and one file per module into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(self.modules.len() + 1);
        let index_path = dir.join("mod.rs");
        std::fs::write(&index_path, &self.index)?;
        written.push(index_path);
        for module in &self.modules {
            let path = dir.join(&module.file_name);
            std::fs::write(&path, &module.source)?;
            written.push(path);
        }
        tracing::info!(dir = %dir.display(), files = written.len(), "wrote generated modules");
        Ok(written)
    }

    /// Everything in one source text, with each module inlined into the index.
    pub fn to_single_source(&self) -> String {
        let mut cg = Codegen::new();
        let mut inlined = self.modules.iter().map(|m| (format!("pub mod {};", m.module), m)).collect::<HashMap<_, _>>();
        for line in self.index.lines() {
            match inlined.remove(line) {
                Some(module) => {
                    cg.block(format!("pub mod {}", module.module), |cg| {
                        cg.line(module.source.trim_end());
                    });
                }
                None => cg.line(line),
            }
        }
        cg.into_string()
    }
}

impl Generator {
    pub fn new(idl: &Idl, config: GeneratorConfig) -> Result<Self, GenError> {
        let table = TypeTable::from_idl(idl)?;
        check_item_names(&table)?;
        let registry = LayoutRegistry::from_table(&table)?;
        Ok(Generator { table, registry, config })
    }

    pub fn from_json_str(src: &str, config: GeneratorConfig) -> Result<Self, GenError> {
        Self::new(&Idl::from_json_str(src)?, config)
    }

    pub fn table(&self) -> &TypeTable {
        &self.table
    }

    pub fn registry(&self) -> &LayoutRegistry {
        &self.registry
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn bundle(&self, name: &str) -> Result<TypeBundle<'_>, GenError> {
        TypeBundle::new(&self.table, name)
    }

    /// Executable bundles for every definition, in declaration order.
    pub fn bundles(&self) -> Result<Vec<TypeBundle<'_>>, GenError> {
        self.table.defs().map(|def| self.bundle(&def.name)).collect()
    }

    /// Render every type module and the index; output order never depends on scheduling.
    pub fn render(&self) -> Result<RenderedModules, GenError> {
        let defs = self.table.defs().collect::<Vec<_>>();
        let render_one = |def: &&IdlTypeDef| self.render_module(def);
        let modules = if self.config.parallel {
            defs.par_iter().map(render_one).collect::<Result<Vec<_>, _>>()?
        } else {
            defs.iter().map(render_one).collect::<Result<Vec<_>, _>>()?
        };
        let index = self.render_index();
        tracing::info!(
            types = modules.len(),
            parallel = self.config.parallel,
            "generated type modules"
        );
        Ok(RenderedModules { modules, index })
    }

    fn render_module(&self, def: &IdlTypeDef) -> Result<RenderedModule, GenError> {
        let module = field_ident(&def.name);
        let source = self.bundle(&def.name)?.render(&self.config)?;
        Ok(RenderedModule {
            type_name: def.name.clone(),
            file_name: format!("{}.rs", module_file_stem(&module)),
            module,
            source,
        })
    }

    fn render_index(&self) -> String {
        let rt = &self.config.runtime_path;
        let mut cg = Codegen::new();
        cg.line("//! Types generated from the IDL. Do not edit by hand.");
        cg.blank();
        for def in self.table.defs() {
            cg.line(format!("pub mod {};", field_ident(&def.name)));
        }
        cg.blank();
        for def in self.table.defs() {
            let module = field_ident(&def.name);
            cg.line(format!("pub use {module}::{{{}}};", exported_items(def).join(", ")));
        }
        cg.blank();

        cg.line(format!("static REGISTRY: std::sync::LazyLock<{rt}::LayoutRegistry> = std::sync::LazyLock::new(|| {{"));
        if self.table.is_empty() {
            cg.line(format!("    {rt}::LayoutRegistry::default()"));
        } else {
            cg.line("    [");
            for def in self.table.defs() {
                let module = field_ident(&def.name);
                let layout = match &def.ty {
                    IdlTypeDefTy::Struct { .. } => format!("{module}::{}::layout()", type_ident(&def.name)),
                    IdlTypeDefTy::Enum { .. } => format!("{module}::layout()"),
                };
                cg.line(format!("        ({:?}, {layout}),", def.name));
            }
            cg.line("    ]");
            cg.line("    .into_iter()");
            cg.line("    .collect()");
        }
        cg.line("});");
        cg.blank();
        cg.line("/// Layouts of every generated type, for resolving references at encode/parse time.");
        cg.block(format!("pub fn registry() -> &'static {rt}::LayoutRegistry"), |cg| {
            cg.line("&REGISTRY");
        });
        cg.into_string()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn exported_items(def: &IdlTypeDef) -> Vec<String> {
    let stem = to_pascal_case(&def.name);
    match &def.ty {
        IdlTypeDefTy::Struct { .. } => vec![type_ident(&def.name), format!("{stem}Fields"), format!("{stem}Json")],
        IdlTypeDefTy::Enum { .. } => vec![format!("{stem}Json"), format!("{stem}Kind")],
    }
}

/// Distinct IDL names may still collapse onto one module or one re-exported item.
fn check_item_names(table: &TypeTable) -> Result<(), GenError> {
    let mut modules = HashMap::new();
    let mut items = HashMap::new();
    for def in table.defs() {
        let module = field_ident(&def.name);
        if let Some(other) = modules.insert(module_file_stem(&module).to_string(), def.name.as_str()) {
            tracing::warn!(first = other, second = %def.name, %module, "module name collision");
            return Err(GenError::DuplicateType(def.name.clone()));
        }
        for item in exported_items(def) {
            if let Some(other) = items.insert(item.clone(), def.name.as_str()) {
                tracing::warn!(first = other, second = %def.name, %item, "generated item collision");
                return Err(GenError::DuplicateType(def.name.clone()));
            }
        }
    }
    Ok(())
}
