//! Renders every fixture IDL into `OUT_DIR` so `tests/generated_modules.rs`
//! compiles the output against the runtime.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use idl_typegen::codegen::field_ident;
use idl_typegen::{Generator, GeneratorConfig};

fn main() -> Result<()> {
    let fixtures = Path::new("fixtures");
    println!("cargo::rerun-if-changed={}", fixtures.display());
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);

    let mut programs = fs::read_dir(fixtures)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.join("idl.json").is_file())
        .collect::<Vec<_>>();
    programs.sort();

    let config = GeneratorConfig { parallel: false, ..GeneratorConfig::default() };
    let mut index = String::new();
    for program in &programs {
        let name = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("fixture directory without a name")?;
        let src = fs::read_to_string(program.join("idl.json"))?;
        let generator = Generator::from_json_str(&src, config.clone())
            .with_context(|| format!("invalid IDL in {name}"))?;
        let dir = out_dir.join(&name);
        generator
            .render()
            .with_context(|| format!("failed to render {name}"))?
            .write_to(&dir)?;
        let module_path = dir.join("mod.rs").to_string_lossy().into_owned();
        index.push_str(&format!("#[path = {module_path:?}]\npub mod {};\n", field_ident(&name)));
    }
    fs::write(out_dir.join("fixtures.rs"), index)?;
    Ok(())
}
