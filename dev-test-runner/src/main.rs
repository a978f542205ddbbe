//! Fixture runner: every `<fixtures>/<program>/` directory holds an `idl.json`
//! and a `cases.json`. Each case is pushed through
//! JSON -> value -> bytes -> value -> JSON and compared against the expected hex.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use idl_typegen::{Generator, GeneratorConfig};
use serde::Deserialize;

#[derive(Parser, Debug)]
struct Cli {
    /// directory of fixture programs
    #[arg(long, default_value = "dev-test-runner/fixtures")]
    fixtures: PathBuf,

    /// only run fixture programs whose directory name contains this
    #[arg(long)]
    filter: Option<String>,

    /// debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct Case {
    #[serde(rename = "type")]
    type_name: String,
    /// JSON projection; absent for decode-only cases.
    #[serde(default)]
    json: Option<serde_json::Value>,
    hex: String,
    /// The bytes must fail to decode.
    #[serde(default)]
    error: bool,
}

#[derive(Debug, Default)]
struct Tally {
    passed: usize,
    failed: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .init();

    let mut programs = std::fs::read_dir(&cli.fixtures)
        .with_context(|| format!("failed to read fixtures directory {}", cli.fixtures.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.join("idl.json").is_file())
        .filter(|path| match (&cli.filter, path.file_name()) {
            (Some(filter), Some(name)) => name.to_string_lossy().contains(filter.as_str()),
            _ => true,
        })
        .collect::<Vec<_>>();
    programs.sort();

    let mut tally = Tally::default();
    for program in &programs {
        run_program(program, &mut tally)?;
    }

    let summary = format!("{} passed, {} failed", tally.passed, tally.failed);
    if tally.failed > 0 {
        eprintln!("{}", summary.red().bold());
        bail!("{} fixture case(s) failed", tally.failed);
    }
    eprintln!("{}", summary.green().bold());
    Ok(())
}

fn run_program(dir: &Path, tally: &mut Tally) -> Result<()> {
    let name = dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    eprintln!("{} {name}", "——".dimmed());

    let idl_src = std::fs::read_to_string(dir.join("idl.json")).context("failed to read idl.json")?;
    let generator = Generator::from_json_str(&idl_src, GeneratorConfig::default())
        .with_context(|| format!("invalid IDL in {name}"))?;
    // rendering must succeed for every fixture, even though only the bundles are exercised
    generator.render().with_context(|| format!("failed to render {name}"))?;

    let cases_src = std::fs::read_to_string(dir.join("cases.json")).context("failed to read cases.json")?;
    let cases: Vec<Case> =
        serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_str(&cases_src))
            .with_context(|| format!("invalid cases.json in {name}"))?;

    for (i, case) in cases.iter().enumerate() {
        let label = format!("#{i} {}", case.type_name);
        match run_case(&generator, case) {
            Ok(()) => {
                tally.passed += 1;
                eprintln!("  {} {label}", "✓".green());
            }
            Err(error) => {
                tally.failed += 1;
                eprintln!("  {} {label}: {error:#}", "✗".red());
            }
        }
    }
    Ok(())
}

fn run_case(generator: &Generator, case: &Case) -> Result<()> {
    let bundle = generator.bundle(&case.type_name)?;
    let registry = generator.registry();
    let expected = hex::decode(&case.hex).context("invalid hex in case")?;

    if case.error {
        if let Ok(value) = bundle.decode(&expected, registry) {
            bail!("expected a decode failure, got {value:?}");
        }
        return Ok(());
    }

    let Some(json) = case.json.as_ref() else {
        bail!("case needs `json` unless it is an error case");
    };
    let value = bundle.from_json(json).context("json -> value")?;
    let bytes = bundle.encode(&value, registry).context("value -> bytes")?;
    if bytes != expected {
        bail!("encoded {} but expected {}", hex::encode(&bytes), case.hex);
    }
    let decoded = bundle.decode(&bytes, registry).context("bytes -> value")?;
    if decoded != value {
        bail!("decoded {decoded:?} but started from {value:?}");
    }
    let back = bundle.to_json(&decoded).context("value -> json")?;
    if &back != json {
        bail!("json round trip produced {back}");
    }
    Ok(())
}
