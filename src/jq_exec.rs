//! jq preprocessing of IDL documents (e.g. `.idl` to unwrap an envelope, or
//! `.types |= map(select(.name != "Legacy"))`).
use anyhow::{Context, Result, anyhow, bail};
use jaq_core::{Compiler, Ctx, RcIter, compile::Undefined, load};
use jaq_json::Val;
use serde_json::Value;

/// Run `filter_src` over `input`, returning every output document.
pub fn run_jaq(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader.load(&arena, program).map_err(format_parse_errors)?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(format_undefined_errors)?;

    let inputs = RcIter::new(core::iter::empty());
    let outputs = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut out = Vec::new();
    for item in outputs {
        let v = item.map_err(|e| anyhow!("jq runtime error: {e:?}"))?;
        // Val displays as JSON text
        let text = format!("{v}");
        out.push(serde_json::from_str(&text).with_context(|| format!("jq produced non-JSON output: {text}"))?);
    }
    Ok(out)
}

/// Like [`run_jaq`], but the filter must yield exactly one IDL document.
pub fn preprocess_idl(filter_src: &str, input: &Value) -> Result<Value> {
    let mut outputs = run_jaq(filter_src, input)?;
    match outputs.len() {
        1 => Ok(outputs.remove(0)),
        n => bail!("jq filter `{filter_src}` produced {n} documents, expected exactly one IDL"),
    }
}

fn format_parse_errors(errs: Vec<(load::File<&str, ()>, load::Error<&str>)>) -> anyhow::Error {
    let lines = errs
        .iter()
        .map(|(file, err)| format!("jq parse error: {err:?} in `{}`", file.code))
        .collect::<Vec<_>>();
    anyhow!(lines.join("\n"))
}

fn format_undefined_errors(errs: Vec<(load::File<&str, ()>, Vec<(&str, Undefined)>)>) -> anyhow::Error {
    let lines = errs
        .iter()
        .flat_map(|(file, list)| {
            list.iter()
                .map(move |(name, undef)| format!("jq: undefined `{name}` ({undef:?}) in `{}`", file.code))
        })
        .collect::<Vec<_>>();
    anyhow!(lines.join("\n"))
}
