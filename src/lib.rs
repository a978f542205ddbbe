//! Generate Borsh layouts, value types, JSON mirrors and converters from an
//! Anchor-style IDL.
//!
//! Every IDL type gets two faces built from the same derivation:
//!
//! - an executable [`TypeBundle`] that encodes, decodes and converts
//!   [`Value`]s at run time, and
//! - a rendered Rust module (see [`Generator::render`]) that a downstream
//!   crate compiles against [`runtime`].
pub mod codec;
pub mod codegen;
pub mod emit;
pub mod error;
pub mod idl;
pub mod jq_exec;
pub mod layout;
pub mod module;
pub mod path_de;
pub mod project;
pub mod resolve;
pub mod runtime;
pub mod value;

pub use codec::Decoded;
pub use emit::{EnumBundle, StructBundle, TypeBundle, VariantInfo};
pub use error::{CodecError, ConvertError, GenError};
pub use idl::{Idl, IdlType};
pub use layout::{Layout, LayoutRegistry};
pub use module::{Generator, GeneratorConfig, RenderedModule, RenderedModules};
pub use resolve::TypeTable;
pub use value::{EnumValue, Payload, PublicKey, StructValue, Value};
