//! Surface that rendered modules link against.
//!
//! Generated code only names items from here (plus `serde`), so the runtime
//! path can be re-pointed with `GeneratorConfig::runtime_path`.
use std::str::FromStr;

use thiserror::Error;

pub use crate::codec::Decoded;
pub use crate::error::{CodecError, ConvertError};
pub use crate::layout::{Layout, LayoutRegistry};
pub use crate::value::PublicKey;

/// Either half of a bytes <-> value trip.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

/// Look up `name` in a decoded record and convert it, tagging failures with the field.
pub fn field<T>(
    obj: &Decoded,
    name: &str,
    convert: impl FnOnce(&Decoded) -> Result<T, ConvertError>,
) -> Result<T, ConvertError> {
    obj.field(name).and_then(convert).map_err(|e| e.within(name))
}

pub fn into_array<T, const N: usize>(items: Vec<T>) -> Result<[T; N], ConvertError> {
    let len = items.len();
    items
        .try_into()
        .map_err(|_| ConvertError::mismatch("", format!("array of {N}"), format!("{len} elements")))
}

/// 64-bit and wider integers travel through JSON as decimal strings.
pub fn parse_wide<T: FromStr>(text: &str) -> Result<T, ConvertError> {
    text.parse()
        .map_err(|_| ConvertError::mismatch("", "decimal integer string", format!("{text:?}")))
}

pub fn parse_public_key(text: &str) -> Result<PublicKey, ConvertError> {
    text.parse()
        .map_err(|e| ConvertError::mismatch("", "base58 public key", format!("{text:?} ({e})")))
}

/// A decoded enum must be a record with exactly one key naming the variant.
pub fn check_single_variant(obj: &Decoded, enum_name: &str) -> Result<(), ConvertError> {
    let map = obj.to_struct().map_err(|_| ConvertError::InvalidEnum {
        enum_name: enum_name.to_string(),
        reason: format!("expected a single-key record, found {}", obj.kind_name()),
    })?;
    if map.len() != 1 {
        tracing::warn!(enum_name, keys = map.len(), "rejecting decoded enum record");
        return Err(ConvertError::InvalidEnum {
            enum_name: enum_name.to_string(),
            reason: format!("expected exactly one variant key, found {}", map.len()),
        });
    }
    Ok(())
}

pub fn no_variant_matched(obj: &Decoded, enum_name: &str) -> ConvertError {
    let keys = match obj {
        Decoded::Struct(map) => map.keys().cloned().collect::<Vec<_>>().join(", "),
        other => other.kind_name().to_string(),
    };
    tracing::warn!(enum_name, %keys, "decoded enum record matched no variant");
    ConvertError::InvalidEnum {
        enum_name: enum_name.to_string(),
        reason: format!("no variant named `{keys}`"),
    }
}
