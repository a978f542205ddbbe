//! Borsh-compatible encoding/parsing driven by a [`Layout`].
//!
//! Parsing produces the binary-decoded container ([`Decoded`]); encoding
//! consumes the same shape (the "encodable" form). Enum values appear as a
//! single-key record naming the variant.
use indexmap::IndexMap;

use crate::error::{CodecError, ConvertError};
use crate::layout::{Layout, LayoutRegistry};
use crate::value::PublicKey;

/// Hard cap on nested defined-type values while reading or writing.
/// Anonymous containers live inside one finite layout and are not counted.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Bool(bool),
    UInt(u128),
    Int(i128),
    Float(f64),
    String(String),
    /// `bytes` payloads and raw 32-byte public keys.
    Bytes(Vec<u8>),
    List(Vec<Decoded>),
    Option(Option<Box<Decoded>>),
    Map(Vec<(Decoded, Decoded)>),
    Struct(IndexMap<String, Decoded>),
}

// ————————————————————————————————————————————————————————————————————————————
// WRITER / READER
// ————————————————————————————————————————————————————————————————————————————

/// Little-endian writer with u32 length prefixes.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_len(&mut self, len: usize) -> Result<(), CodecError> {
        let len: u32 = len.try_into().map_err(|_| CodecError::LengthTooLarge(len))?;
        self.buf.extend_from_slice(&len.to_le_bytes());
        Ok(())
    }

    pub fn write_len_prefixed_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.write_len(bytes.len())?;
        self.write_bytes(bytes);
        Ok(())
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn position(&self) -> usize {
        self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .offset
            .checked_add(len)
            .ok_or(CodecError::OutOfBounds)?;
        if end > self.bytes.len() {
            return Err(CodecError::OutOfBounds);
        }
        let out = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let chunk = self.take(N)?;
        chunk.try_into().map_err(|_| CodecError::OutOfBounds)
    }

    pub fn read_len(&mut self) -> Result<usize, CodecError> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?) as usize)
    }

    pub fn read_len_prefixed_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_len()?;
        self.take(len)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// LAYOUT-DRIVEN ENCODE / PARSE
// ————————————————————————————————————————————————————————————————————————————

impl Layout {
    pub fn encode(&self, value: &Decoded, registry: &LayoutRegistry) -> Result<Vec<u8>, CodecError> {
        let mut writer = Writer::default();
        self.encode_into(value, registry, &mut writer)?;
        Ok(writer.into_vec())
    }

    pub fn encode_into(
        &self,
        value: &Decoded,
        registry: &LayoutRegistry,
        writer: &mut Writer,
    ) -> Result<(), CodecError> {
        encode_at(self, value, registry, writer, 0)
    }

    /// Parse exactly one value; trailing bytes are an error.
    pub fn parse(&self, bytes: &[u8], registry: &LayoutRegistry) -> Result<Decoded, CodecError> {
        let mut reader = Reader::new(bytes);
        let value = self.parse_from(&mut reader, registry)?;
        match reader.remaining() {
            0 => Ok(value),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }

    /// Parse one value from the front of the reader.
    pub fn parse_from(&self, reader: &mut Reader<'_>, registry: &LayoutRegistry) -> Result<Decoded, CodecError> {
        parse_at(self, reader, registry, 0)
    }
}

fn shape(layout: &Layout, found: &Decoded) -> CodecError {
    CodecError::Shape {
        expected: layout.name().to_string(),
        found: found.kind_name().to_string(),
    }
}

fn unsigned_of(layout: &Layout, value: &Decoded) -> Result<u128, CodecError> {
    match value {
        Decoded::UInt(n) => Ok(*n),
        Decoded::Int(i) => u128::try_from(*i).map_err(|_| CodecError::IntegerOutOfRange {
            layout: layout.name(),
            value: i.to_string(),
        }),
        other => Err(shape(layout, other)),
    }
}

fn signed_of(layout: &Layout, value: &Decoded) -> Result<i128, CodecError> {
    match value {
        Decoded::Int(i) => Ok(*i),
        Decoded::UInt(n) => i128::try_from(*n).map_err(|_| CodecError::IntegerOutOfRange {
            layout: layout.name(),
            value: n.to_string(),
        }),
        other => Err(shape(layout, other)),
    }
}

fn narrow<T: TryFrom<N>, N: Copy + ToString>(layout: &Layout, n: N) -> Result<T, CodecError> {
    T::try_from(n).map_err(|_| CodecError::IntegerOutOfRange {
        layout: layout.name(),
        value: n.to_string(),
    })
}

/// Resolve a defined-type hop, refusing to go past [`MAX_DEPTH`].
fn enter<'r>(registry: &'r LayoutRegistry, name: &str, depth: usize) -> Result<&'r Layout, CodecError> {
    if depth >= MAX_DEPTH {
        return Err(CodecError::DepthLimit(MAX_DEPTH));
    }
    registry.get(name).ok_or_else(|| CodecError::UnknownLayout(name.to_string()))
}

fn encode_at(
    layout: &Layout,
    value: &Decoded,
    registry: &LayoutRegistry,
    w: &mut Writer,
    depth: usize,
) -> Result<(), CodecError> {
    match layout {
        Layout::Bool => match value {
            Decoded::Bool(b) => w.write_u8(u8::from(*b)),
            other => return Err(shape(layout, other)),
        },
        Layout::U8 => w.write_u8(narrow::<u8, _>(layout, unsigned_of(layout, value)?)?),
        Layout::U16 => w.write_bytes(&narrow::<u16, _>(layout, unsigned_of(layout, value)?)?.to_le_bytes()),
        Layout::U32 => w.write_bytes(&narrow::<u32, _>(layout, unsigned_of(layout, value)?)?.to_le_bytes()),
        Layout::U64 => w.write_bytes(&narrow::<u64, _>(layout, unsigned_of(layout, value)?)?.to_le_bytes()),
        Layout::U128 => w.write_bytes(&unsigned_of(layout, value)?.to_le_bytes()),
        Layout::I8 => w.write_bytes(&narrow::<i8, _>(layout, signed_of(layout, value)?)?.to_le_bytes()),
        Layout::I16 => w.write_bytes(&narrow::<i16, _>(layout, signed_of(layout, value)?)?.to_le_bytes()),
        Layout::I32 => w.write_bytes(&narrow::<i32, _>(layout, signed_of(layout, value)?)?.to_le_bytes()),
        Layout::I64 => w.write_bytes(&narrow::<i64, _>(layout, signed_of(layout, value)?)?.to_le_bytes()),
        Layout::I128 => w.write_bytes(&signed_of(layout, value)?.to_le_bytes()),
        Layout::F32 => match value {
            Decoded::Float(f) => w.write_bytes(&(*f as f32).to_le_bytes()),
            other => return Err(shape(layout, other)),
        },
        Layout::F64 => match value {
            Decoded::Float(f) => w.write_bytes(&f.to_le_bytes()),
            other => return Err(shape(layout, other)),
        },
        Layout::String => match value {
            Decoded::String(s) => w.write_len_prefixed_bytes(s.as_bytes())?,
            other => return Err(shape(layout, other)),
        },
        Layout::Bytes => match value {
            Decoded::Bytes(b) => w.write_len_prefixed_bytes(b)?,
            other => return Err(shape(layout, other)),
        },
        Layout::PublicKey => match value {
            Decoded::Bytes(b) if b.len() == PublicKey::LEN => w.write_bytes(b),
            Decoded::Bytes(b) => {
                return Err(CodecError::Shape {
                    expected: "32-byte public key".to_string(),
                    found: format!("{} bytes", b.len()),
                });
            }
            other => return Err(shape(layout, other)),
        },
        Layout::Vec(inner) => match value {
            Decoded::List(items) => {
                w.write_len(items.len())?;
                for item in items {
                    encode_at(inner, item, registry, w, depth)?;
                }
            }
            other => return Err(shape(layout, other)),
        },
        Layout::Array(inner, len) => match value {
            Decoded::List(items) if items.len() == *len => {
                for item in items {
                    encode_at(inner, item, registry, w, depth)?;
                }
            }
            Decoded::List(items) => {
                return Err(CodecError::Shape {
                    expected: format!("array of {len}"),
                    found: format!("list of {}", items.len()),
                });
            }
            other => return Err(shape(layout, other)),
        },
        Layout::Option(inner) => match value {
            Decoded::Option(None) => w.write_u8(0),
            Decoded::Option(Some(item)) => {
                w.write_u8(1);
                encode_at(inner, item, registry, w, depth)?;
            }
            other => return Err(shape(layout, other)),
        },
        Layout::HashMap(k, v) => match value {
            Decoded::Map(entries) => {
                w.write_len(entries.len())?;
                for (key, val) in entries {
                    encode_at(k, key, registry, w, depth)?;
                    encode_at(v, val, registry, w, depth)?;
                }
            }
            other => return Err(shape(layout, other)),
        },
        Layout::Struct(fields) => match value {
            Decoded::Struct(map) => {
                for (name, field_layout) in fields {
                    let field = map.get(name).ok_or_else(|| CodecError::Shape {
                        expected: format!("field `{name}`"),
                        found: "nothing".to_string(),
                    })?;
                    encode_at(field_layout, field, registry, w, depth)?;
                }
            }
            other => return Err(shape(layout, other)),
        },
        Layout::Enum(variants) => match value {
            Decoded::Struct(map) if map.len() == 1 => {
                let (kind, payload) = map.iter().next().ok_or(CodecError::OutOfBounds)?;
                let (tag, _, variant_layout) = variants.get_full(kind).ok_or_else(|| CodecError::Shape {
                    expected: format!("one of {:?}", variants.keys().collect::<Vec<_>>()),
                    found: format!("variant `{kind}`"),
                })?;
                w.write_u8(narrow::<u8, _>(layout, tag)?);
                encode_at(variant_layout, payload, registry, w, depth)?;
            }
            other => {
                return Err(CodecError::Shape {
                    expected: "single-variant record".to_string(),
                    found: other.kind_name().to_string(),
                });
            }
        },
        Layout::Defined(name) => {
            let target = enter(registry, name, depth)?;
            encode_at(target, value, registry, w, depth + 1)?;
        }
    }
    Ok(())
}

fn parse_at(
    layout: &Layout,
    r: &mut Reader<'_>,
    registry: &LayoutRegistry,
    depth: usize,
) -> Result<Decoded, CodecError> {
    let value = match layout {
        Layout::Bool => match r.read_u8()? {
            0 => Decoded::Bool(false),
            1 => Decoded::Bool(true),
            other => return Err(CodecError::InvalidBool(other)),
        },
        Layout::U8 => Decoded::UInt(r.read_u8()?.into()),
        Layout::U16 => Decoded::UInt(u16::from_le_bytes(r.read_array()?).into()),
        Layout::U32 => Decoded::UInt(u32::from_le_bytes(r.read_array()?).into()),
        Layout::U64 => Decoded::UInt(u64::from_le_bytes(r.read_array()?).into()),
        Layout::U128 => Decoded::UInt(u128::from_le_bytes(r.read_array()?)),
        Layout::I8 => Decoded::Int(i8::from_le_bytes(r.read_array()?).into()),
        Layout::I16 => Decoded::Int(i16::from_le_bytes(r.read_array()?).into()),
        Layout::I32 => Decoded::Int(i32::from_le_bytes(r.read_array()?).into()),
        Layout::I64 => Decoded::Int(i64::from_le_bytes(r.read_array()?).into()),
        Layout::I128 => Decoded::Int(i128::from_le_bytes(r.read_array()?)),
        Layout::F32 => Decoded::Float(f32::from_le_bytes(r.read_array()?).into()),
        Layout::F64 => Decoded::Float(f64::from_le_bytes(r.read_array()?)),
        Layout::String => {
            let bytes = r.read_len_prefixed_bytes()?;
            let s = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
            Decoded::String(s.to_string())
        }
        Layout::Bytes => Decoded::Bytes(r.read_len_prefixed_bytes()?.to_vec()),
        Layout::PublicKey => Decoded::Bytes(r.read_array::<32>()?.to_vec()),
        Layout::Vec(inner) => {
            let len = r.read_len()?;
            // a hostile prefix must not drive the allocation
            let mut items = Vec::with_capacity(len.min(r.remaining()));
            for _ in 0..len {
                items.push(parse_at(inner, r, registry, depth)?);
            }
            Decoded::List(items)
        }
        Layout::Array(inner, len) => {
            let mut items = Vec::with_capacity((*len).min(r.remaining()));
            for _ in 0..*len {
                items.push(parse_at(inner, r, registry, depth)?);
            }
            Decoded::List(items)
        }
        Layout::Option(inner) => match r.read_u8()? {
            0 => Decoded::Option(None),
            1 => Decoded::Option(Some(Box::new(parse_at(inner, r, registry, depth)?))),
            other => return Err(CodecError::InvalidOptionFlag(other)),
        },
        Layout::HashMap(k, v) => {
            let len = r.read_len()?;
            let mut entries = Vec::with_capacity(len.min(r.remaining()));
            for _ in 0..len {
                let key = parse_at(k, r, registry, depth)?;
                let val = parse_at(v, r, registry, depth)?;
                entries.push((key, val));
            }
            Decoded::Map(entries)
        }
        Layout::Struct(fields) => {
            let mut out = IndexMap::with_capacity(fields.len());
            for (name, field_layout) in fields {
                out.insert(name.clone(), parse_at(field_layout, r, registry, depth)?);
            }
            Decoded::Struct(out)
        }
        Layout::Enum(variants) => {
            let tag = r.read_u8()?;
            let (kind, variant_layout) = variants
                .get_index(tag as usize)
                .ok_or_else(|| CodecError::InvalidEnumTag {
                    enum_name: variants.keys().cloned().collect::<Vec<_>>().join("|"),
                    tag,
                })?;
            let payload = parse_at(variant_layout, r, registry, depth)?;
            Decoded::Struct(IndexMap::from([(kind.clone(), payload)]))
        }
        Layout::Defined(name) => {
            let target = enter(registry, name, depth)?;
            parse_at(target, r, registry, depth + 1)?
        }
    };
    Ok(value)
}

// ————————————————————————————————————————————————————————————————————————————
// ACCESSORS (decoded -> typed), shared by the runtime engine and generated code
// ————————————————————————————————————————————————————————————————————————————

fn expect(expected: &str, found: &Decoded) -> ConvertError {
    ConvertError::mismatch("", expected, found.kind_name())
}

impl Decoded {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Decoded::Bool(_) => "bool",
            Decoded::UInt(_) => "unsigned integer",
            Decoded::Int(_) => "signed integer",
            Decoded::Float(_) => "float",
            Decoded::String(_) => "string",
            Decoded::Bytes(_) => "bytes",
            Decoded::List(_) => "list",
            Decoded::Option(_) => "option",
            Decoded::Map(_) => "map",
            Decoded::Struct(_) => "record",
        }
    }

    pub fn structure<'a>(fields: impl IntoIterator<Item = (&'a str, Decoded)>) -> Decoded {
        Decoded::Struct(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Encodable form of an enum value: `{ kind: payload }`.
    pub fn variant_of(kind: &str, payload: Decoded) -> Decoded {
        Decoded::Struct(IndexMap::from([(kind.to_string(), payload)]))
    }

    pub fn empty() -> Decoded {
        Decoded::Struct(IndexMap::new())
    }

    pub fn to_struct(&self) -> Result<&IndexMap<String, Decoded>, ConvertError> {
        match self {
            Decoded::Struct(map) => Ok(map),
            other => Err(expect("record", other)),
        }
    }

    pub fn field(&self, name: &str) -> Result<&Decoded, ConvertError> {
        self.to_struct()?
            .get(name)
            .ok_or_else(|| ConvertError::mismatch("", format!("field `{name}`"), "nothing"))
    }

    /// Payload of `kind` when this is an enum record naming that variant.
    pub fn variant(&self, kind: &str) -> Option<&Decoded> {
        match self {
            Decoded::Struct(map) => map.get(kind),
            _ => None,
        }
    }

    pub fn to_bool(&self) -> Result<bool, ConvertError> {
        match self {
            Decoded::Bool(b) => Ok(*b),
            other => Err(expect("bool", other)),
        }
    }

    fn unsigned<T: TryFrom<u128>>(&self, what: &str) -> Result<T, ConvertError> {
        match self {
            Decoded::UInt(n) => T::try_from(*n).map_err(|_| ConvertError::mismatch("", what, n.to_string())),
            other => Err(expect(what, other)),
        }
    }

    fn signed<T: TryFrom<i128>>(&self, what: &str) -> Result<T, ConvertError> {
        match self {
            Decoded::Int(n) => T::try_from(*n).map_err(|_| ConvertError::mismatch("", what, n.to_string())),
            other => Err(expect(what, other)),
        }
    }

    pub fn to_u8(&self) -> Result<u8, ConvertError> { self.unsigned("u8") }
    pub fn to_u16(&self) -> Result<u16, ConvertError> { self.unsigned("u16") }
    pub fn to_u32(&self) -> Result<u32, ConvertError> { self.unsigned("u32") }
    pub fn to_u64(&self) -> Result<u64, ConvertError> { self.unsigned("u64") }
    pub fn to_u128(&self) -> Result<u128, ConvertError> { self.unsigned("u128") }
    pub fn to_i8(&self) -> Result<i8, ConvertError> { self.signed("i8") }
    pub fn to_i16(&self) -> Result<i16, ConvertError> { self.signed("i16") }
    pub fn to_i32(&self) -> Result<i32, ConvertError> { self.signed("i32") }
    pub fn to_i64(&self) -> Result<i64, ConvertError> { self.signed("i64") }
    pub fn to_i128(&self) -> Result<i128, ConvertError> { self.signed("i128") }

    pub fn to_f64(&self) -> Result<f64, ConvertError> {
        match self {
            Decoded::Float(f) => Ok(*f),
            other => Err(expect("float", other)),
        }
    }

    pub fn to_f32(&self) -> Result<f32, ConvertError> {
        self.to_f64().map(|f| f as f32)
    }

    pub fn to_string_value(&self) -> Result<String, ConvertError> {
        match self {
            Decoded::String(s) => Ok(s.clone()),
            other => Err(expect("string", other)),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ConvertError> {
        match self {
            Decoded::Bytes(b) => Ok(b.clone()),
            other => Err(expect("bytes", other)),
        }
    }

    pub fn to_public_key(&self) -> Result<PublicKey, ConvertError> {
        match self {
            Decoded::Bytes(b) => PublicKey::from_slice(b)
                .map_err(|e| ConvertError::mismatch("", "32-byte public key", e.to_string())),
            other => Err(expect("public key bytes", other)),
        }
    }

    pub fn to_list(&self) -> Result<&[Decoded], ConvertError> {
        match self {
            Decoded::List(items) => Ok(items),
            other => Err(expect("list", other)),
        }
    }

    pub fn to_option(&self) -> Result<Option<&Decoded>, ConvertError> {
        match self {
            Decoded::Option(inner) => Ok(inner.as_deref()),
            other => Err(expect("option", other)),
        }
    }

    pub fn to_map(&self) -> Result<&[(Decoded, Decoded)], ConvertError> {
        match self {
            Decoded::Map(entries) => Ok(entries),
            other => Err(expect("map", other)),
        }
    }
}

// encodable construction from borrowed primitives, as used by generated code
macro_rules! decoded_from_ref {
    ($variant:ident: $($t:ty),*) => {
        $(impl From<&$t> for Decoded {
            fn from(v: &$t) -> Self {
                Decoded::$variant((*v).into())
            }
        })*
    };
}

decoded_from_ref!(UInt: u8, u16, u32, u64, u128);
decoded_from_ref!(Int: i8, i16, i32, i64, i128);
decoded_from_ref!(Float: f32, f64);
decoded_from_ref!(Bool: bool);

impl From<&String> for Decoded {
    fn from(v: &String) -> Self {
        Decoded::String(v.clone())
    }
}

impl From<&Vec<u8>> for Decoded {
    fn from(v: &Vec<u8>) -> Self {
        Decoded::Bytes(v.clone())
    }
}

impl From<&PublicKey> for Decoded {
    fn from(v: &PublicKey) -> Self {
        Decoded::Bytes(v.as_bytes().to_vec())
    }
}
