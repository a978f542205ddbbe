//! Error taxonomy: generation (schema) errors, conversion errors, codec errors.
use thiserror::Error;

/// Schema-level failures. Any of these aborts generation for the type graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenError {
    #[error("type `{type_name}` field `{field}` references undefined type `{missing}`")]
    Reference {
        type_name: String,
        field: String,
        missing: String,
    },
    #[error("type `{type_name}` contains itself without indirection ({cycle})")]
    UnboundedRecursion { type_name: String, cycle: String },
    #[error("duplicate type definition `{0}`")]
    DuplicateType(String),
    #[error("type `{type_name}` declares field `{field}` more than once")]
    DuplicateField { type_name: String, field: String },
    #[error("enum `{enum_name}` declares variant `{variant}` more than once")]
    DuplicateVariant { enum_name: String, variant: String },
    #[error("invalid identifier `{0}`")]
    InvalidIdentifier(String),
    #[error("enum `{enum_name}` has {count} variants; a one-byte tag allows at most 256")]
    TooManyVariants { enum_name: String, count: usize },
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("failed to parse IDL {0}")]
    Parse(String),
}

/// Run-time conversion failures between decoded, value and JSON forms.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("shape mismatch at `{path}`: expected {expected}, found {found}")]
    ShapeMismatch {
        path: String,
        expected: String,
        found: String,
    },
    #[error("invalid enum object for `{enum_name}`: {reason}")]
    InvalidEnum { enum_name: String, reason: String },
    #[error("unrecognized enum kind `{kind}` for `{enum_name}`")]
    UnrecognizedKind { enum_name: String, kind: String },
}

impl ConvertError {
    pub fn mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        ConvertError::ShapeMismatch {
            path: path.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Prefix the mismatch path with an enclosing segment (`field`, `Type.field`).
    pub fn within(self, segment: &str) -> Self {
        match self {
            ConvertError::ShapeMismatch { path, expected, found } => {
                let path = if path.is_empty() {
                    segment.to_string()
                } else if path.starts_with('[') {
                    format!("{segment}{path}")
                } else {
                    format!("{segment}.{path}")
                };
                ConvertError::ShapeMismatch { path, expected, found }
            }
            other => other,
        }
    }
}

/// Byte-level failures from the layout encoder/parser.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer too short")]
    OutOfBounds,
    #[error("invalid utf-8")]
    InvalidUtf8,
    #[error("invalid bool byte {0:#04x}")]
    InvalidBool(u8),
    #[error("invalid option flag {0:#04x}")]
    InvalidOptionFlag(u8),
    #[error("enum `{enum_name}` has no variant with tag {tag}")]
    InvalidEnumTag { enum_name: String, tag: u8 },
    #[error("length {0} does not fit a u32 prefix")]
    LengthTooLarge(usize),
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
    #[error("value {value} out of range for {layout}")]
    IntegerOutOfRange { layout: &'static str, value: String },
    #[error("encodable shape mismatch: layout expects {expected}, found {found}")]
    Shape { expected: String, found: String },
    #[error("layout registry has no type `{0}`")]
    UnknownLayout(String),
    #[error("nesting deeper than {0} levels")]
    DepthLimit(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_nest_outward() {
        let err = ConvertError::mismatch("", "u8", "string").within("[2]").within("items").within("Foo");
        assert_eq!(err.to_string(), "shape mismatch at `Foo.items[2]`: expected u8, found string");
    }
}
