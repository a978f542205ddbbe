//! Indentation-aware source buffer plus Rust identifier helpers.
use std::fmt::Write as _;

const INDENT: &str = "    ";

/// Rust keywords (2024 edition) that need escaping when used as identifiers.
const RUST_RESERVED_KEYWORDS: &[&str] = &[
    "as", "async", "await", "box", "break", "const", "continue", "crate", "do", "dyn", "else",
    "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in", "let", "loop",
    "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return", "self",
    "Self", "static", "struct", "super", "trait", "true", "try", "type", "typeof", "union",
    "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

// `r#` is not allowed for these
const NON_RAW_KEYWORDS: &[&str] = &["crate", "self", "Self", "super"];

/// Type names that would shadow prelude or runtime items inside a generated module.
const SHADOWING_TYPE_NAMES: &[&str] = &[
    "Box", "Clone", "CodecError", "ConvertError", "Decoded", "Default", "Deserialize", "Err",
    "Error", "Layout", "None", "Ok", "Option", "PublicKey", "Result", "Self", "Serialize", "Some",
    "String", "Vec",
];

#[derive(Debug, Default)]
pub struct Codegen {
    out: String,
    depth: usize,
}

impl Codegen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line (or several, split on `\n`) at the current indentation.
    pub fn line(&mut self, text: impl AsRef<str>) {
        for line in text.as_ref().split('\n') {
            if line.is_empty() {
                self.out.push('\n');
                continue;
            }
            for _ in 0..self.depth {
                self.out.push_str(INDENT);
            }
            let _ = writeln!(self.out, "{line}");
        }
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    pub fn open(&mut self, header: impl AsRef<str>) {
        self.line(format!("{} {{", header.as_ref()));
        self.depth += 1;
    }

    pub fn close(&mut self, suffix: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(format!("}}{suffix}"));
    }

    /// Open a continuation whose brackets are part of `header` (`foo([`).
    pub fn indent(&mut self, header: impl AsRef<str>) {
        self.line(header);
        self.depth += 1;
    }

    /// Close an [`Codegen::indent`] continuation with `footer` (`])`).
    pub fn dedent(&mut self, footer: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(footer);
    }

    /// `header {` body `}`
    pub fn block(&mut self, header: impl AsRef<str>, body: impl FnOnce(&mut Self)) {
        self.open(header);
        body(self);
        self.close("");
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

// ------- Identifiers ------- //

/// `vecOfOption` -> `vec_of_option`, `HTTPServer` -> `http_server`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `my_type` -> `MyType`; existing PascalCase is kept.
pub fn to_pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for word in name.split('_').filter(|w| !w.is_empty()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Reserved keywords are escaped as `r#type`; `self`-like ones get a trailing underscore.
pub fn escape_rust_identifier(name: &str) -> String {
    if NON_RAW_KEYWORDS.contains(&name) {
        format!("{name}_")
    } else if RUST_RESERVED_KEYWORDS.contains(&name) {
        format!("r#{name}")
    } else {
        name.to_string()
    }
}

/// Field, binding and module identifier for an IDL name.
pub fn field_ident(name: &str) -> String {
    escape_rust_identifier(&to_snake_case(name))
}

/// Type identifier for an IDL type or variant name.
pub fn type_ident(name: &str) -> String {
    let ident = to_pascal_case(name);
    if SHADOWING_TYPE_NAMES.contains(&ident.as_str()) {
        format!("{ident}_")
    } else {
        ident
    }
}

/// File stem for a module identifier (`r#type` lives in `type.rs`).
pub fn module_file_stem(ident: &str) -> &str {
    ident.strip_prefix("r#").unwrap_or(ident)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_conversions() {
        assert_eq!(to_snake_case("vecOfOption"), "vec_of_option");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("Shape"), "shape");
        assert_eq!(to_snake_case("foo2Bar"), "foo2_bar");
        assert_eq!(to_pascal_case("my_type"), "MyType");
        assert_eq!(to_pascal_case("MyType"), "MyType");
        assert_eq!(to_pascal_case("_1"), "_1");
    }

    #[test]
    fn keywords_and_shadowing_names_are_escaped() {
        assert_eq!(field_ident("type"), "r#type");
        assert_eq!(field_ident("gen"), "r#gen");
        assert_eq!(field_ident("self"), "self_");
        assert_eq!(type_ident("None"), "None_");
        assert_eq!(type_ident("circle"), "Circle");
        assert_eq!(module_file_stem("r#type"), "type");
    }

    #[test]
    fn blocks_indent_their_bodies() {
        let mut cg = Codegen::new();
        cg.block("impl Foo", |cg| {
            cg.line("fn a() {}");
            cg.blank();
            cg.line("fn b() {}");
        });
        assert_eq!(cg.into_string(), "impl Foo {\n    fn a() {}\n\n    fn b() {}\n}\n");
    }

    #[test]
    fn continuations_keep_their_own_brackets() {
        let mut cg = Codegen::new();
        cg.block("fn f() -> Decoded", |cg| {
            cg.indent("Decoded::structure([");
            cg.line("(\"a\", Decoded::from(&1u8)),");
            cg.dedent("])");
        });
        assert_eq!(
            cg.into_string(),
            "fn f() -> Decoded {\n    Decoded::structure([\n        (\"a\", Decoded::from(&1u8)),\n    ])\n}\n"
        );
    }
}
