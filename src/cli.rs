//! CLI: IDL -> (generate | layout | decode | encode)
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use idl_typegen::{Generator, GeneratorConfig, Idl, TypeBundle};
use tracing_subscriber::EnvFilter;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate Borsh layouts, value types, JSON mirrors and converters from an Anchor-style IDL
#[derive(Parser, Debug)]
#[command(name = "idl-typegen", version)]
pub struct CommandLineInterface {
    /// debug-level logging (otherwise RUST_LOG, default `warn`)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// render one Rust module per IDL type plus a `mod.rs` index
    Generate(GenerateOut),
    /// print binary layouts as JSON
    Layout(LayoutOut),
    /// decode hex bytes of one type and print its JSON projection
    Decode(DecodeCmd),
    /// encode the JSON projection of one type and print hex bytes
    Encode(EncodeCmd),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JQ pre-process filter for each IDL document (must yield one document).
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more IDL files. May be literal paths, quoted glob patterns or '-' for stdin.
    /// Types from all inputs are merged in order.
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output directory (a single inlined source on stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// path generated modules import the runtime surface from
    #[arg(long, default_value = "idl_typegen::runtime")]
    runtime_path: String,

    /// render modules sequentially
    #[arg(long)]
    no_parallel: bool,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct LayoutOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// only this type (all types if omitted)
    #[arg(long = "type")]
    type_name: Option<String>,
}

#[derive(clap::Parser, Debug)]
struct DecodeCmd {
    #[command(flatten)]
    input_settings: InputSettings,

    #[arg(long = "type")]
    type_name: String,

    /// Borsh bytes as hex
    #[arg(long)]
    hex: String,
}

#[derive(clap::Parser, Debug)]
struct EncodeCmd {
    #[command(flatten)]
    input_settings: InputSettings,

    #[arg(long = "type")]
    type_name: String,

    /// JSON projection of the value
    #[arg(long)]
    json: String,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_documents(&self, mut apply: impl FnMut(&str, serde_json::Value) -> Result<()>) -> Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = if source_path_str == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
                buf
            } else {
                std::fs::read_to_string(&source_path)
                    .with_context(|| format!("failed to read source file ({source_path_str})"))?
            };
            let json_value = serde_json::from_str::<serde_json::Value>(&source)
                .with_context(|| format!("failed to parse JSON source file ({source_path_str})"))?;
            let json_value = match self.jq_expr.as_ref() {
                None => json_value,
                Some(jq_expr) => idl_typegen::jq_exec::preprocess_idl(jq_expr, &json_value)
                    .with_context(|| format!("failed to apply jq expression to source file ({source_path_str})"))?,
            };
            apply(&source_path_str, json_value)?;
        }
        Ok(())
    }

    /// Merge the `types` of every input into one IDL.
    fn load_idl(&self) -> Result<Idl> {
        let mut merged: Option<Idl> = None;
        self.load_documents(|source_path, json_value| {
            let idl = Idl::from_value(json_value).with_context(|| format!("invalid IDL ({source_path})"))?;
            tracing::debug!(source_path, types = idl.types.len(), "loaded IDL");
            match merged.as_mut() {
                None => merged = Some(idl),
                Some(acc) => acc.types.extend(idl.types),
            }
            Ok(())
        })?;
        merged.ok_or_else(|| anyhow!("no IDL inputs"))
    }

    fn generator(&self, config: GeneratorConfig) -> Result<Generator> {
        let idl = self.load_idl()?;
        Generator::new(&idl, config).context("invalid IDL type graph")
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// stderr fmt subscriber; `-v` wins over `RUST_LOG`.
    pub fn init_tracing(&self) {
        let filter = if self.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        };
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Generate(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let config = GeneratorConfig {
                    runtime_path: target.runtime_path.clone(),
                    parallel: !target.no_parallel,
                };
                let generator = target.input_settings.generator(config)?;
                let rendered = generator.render().context("failed to render modules")?;
                match target.out.as_ref() {
                    Some(out) => {
                        let written = rendered
                            .write_to(out)
                            .with_context(|| format!("failed to write modules to {}", out.display()))?;
                        eprintln!(
                            "{} {} files for {} types in {}",
                            "wrote".green().bold(),
                            written.len(),
                            rendered.modules.len(),
                            out.display()
                        );
                    }
                    None => println!("{}", rendered.to_single_source()),
                }
            }
            Command::Layout(target) => {
                let generator = target.input_settings.generator(GeneratorConfig::default())?;
                let json = match target.type_name.as_deref() {
                    Some(name) => serde_json::to_value(generator.bundle(name)?.layout())?,
                    None => serde_json::to_value(generator.registry())?,
                };
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            Command::Decode(target) => {
                let generator = target.input_settings.generator(GeneratorConfig::default())?;
                let bundle = generator.bundle(&target.type_name)?;
                let bytes = hex::decode(target.hex.trim().trim_start_matches("0x")).context("invalid hex input")?;
                let value = bundle
                    .decode(&bytes, generator.registry())
                    .with_context(|| failure("decode", &bundle))?;
                let json = bundle.to_json(&value)?;
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            Command::Encode(target) => {
                let generator = target.input_settings.generator(GeneratorConfig::default())?;
                let bundle = generator.bundle(&target.type_name)?;
                let json = serde_json::from_str::<serde_json::Value>(&target.json).context("invalid JSON value")?;
                let value = bundle.from_json(&json).with_context(|| failure("read JSON for", &bundle))?;
                let bytes = bundle
                    .encode(&value, generator.registry())
                    .with_context(|| failure("encode", &bundle))?;
                println!("{}", hex::encode(bytes));
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn failure(action: &str, bundle: &TypeBundle<'_>) -> String {
    format!("{} {action} `{}`", "failed to".red(), bundle.name())
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched = glob::glob(pattern)?.collect::<Result<Vec<_>, _>>()?;
            if matched.is_empty() {
                // an explicit glob that matched nothing is a usage error
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
            // glob yields alphabetical order; keep it so merged type order is stable
            out.append(&mut matched);
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
