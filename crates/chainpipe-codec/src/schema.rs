//! Schema nodes and the named schema arena.

use std::collections::{HashMap, HashSet};

use chainpipe_core::error::DecodeError;
use serde::{Deserialize, Serialize};

use crate::address::AddressKind;

/// Handle of a named schema inside a [`SchemaSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaId(pub u32);

/// A node of a binary layout description.
///
/// Identity is structural: two schemas with equal trees encode and decode
/// identically, whatever they are named in a [`SchemaSet`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schema {
    /// Unsigned integer, width in bits (multiple of 8, up to 256).
    Uint(u16),
    /// Two's-complement signed integer, width in bits.
    Int(u16),
    Bool,
    /// Zero-width payload, used for data-less union variants.
    Unit,
    /// Raw bytes of a fixed length.
    FixedBytes(usize),
    Address(AddressKind),
    /// Ordered named fields, no padding between them.
    Struct(Vec<Field>),
    FixedArray { elem: Box<Schema>, len: usize },
    /// Length-prefixed sequence; the prefix is an unsigned integer of
    /// `len_bytes` bytes.
    Vec { elem: Box<Schema>, len_bytes: u8 },
    /// Tagged union selected by a leading discriminant of `tag_bytes` bytes.
    Union { tag_bytes: u8, variants: Vec<Variant> },
    /// Lazily resolved reference to a named schema.
    Ref(SchemaId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub discriminant: u64,
    pub schema: Schema,
}

impl Schema {
    pub const U8: Schema = Schema::Uint(8);
    pub const U16: Schema = Schema::Uint(16);
    pub const U32: Schema = Schema::Uint(32);
    pub const U64: Schema = Schema::Uint(64);
    pub const U128: Schema = Schema::Uint(128);
    pub const U256: Schema = Schema::Uint(256);
    pub const I8: Schema = Schema::Int(8);
    pub const I16: Schema = Schema::Int(16);
    pub const I32: Schema = Schema::Int(32);
    pub const I64: Schema = Schema::Int(64);
    pub const I128: Schema = Schema::Int(128);
    pub const I256: Schema = Schema::Int(256);
    pub const EVM_ADDRESS: Schema = Schema::Address(AddressKind::Evm);
    pub const PUBKEY: Schema = Schema::Address(AddressKind::Pubkey);

    /// Struct from `(name, schema)` pairs in declaration order.
    pub fn structure<I, S>(fields: I) -> Schema
    where
        I: IntoIterator<Item = (S, Schema)>,
        S: Into<String>,
    {
        Schema::Struct(
            fields
                .into_iter()
                .map(|(name, schema)| Field {
                    name: name.into(),
                    schema,
                })
                .collect(),
        )
    }

    /// Tagged union from `(name, discriminant, payload)` triples.
    pub fn sum<I, S>(tag_bytes: u8, variants: I) -> Schema
    where
        I: IntoIterator<Item = (S, u64, Schema)>,
        S: Into<String>,
    {
        Schema::Union {
            tag_bytes,
            variants: variants
                .into_iter()
                .map(|(name, discriminant, schema)| Variant {
                    name: name.into(),
                    discriminant,
                    schema,
                })
                .collect(),
        }
    }

    /// Union of data-less variants numbered 0, 1, 2… in order.
    pub fn unit_enum<I, S>(names: I) -> Schema
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema::sum(
            1,
            names
                .into_iter()
                .enumerate()
                .map(|(i, n)| (n, i as u64, Schema::Unit)),
        )
    }

    pub fn fixed_array(elem: Schema, len: usize) -> Schema {
        Schema::FixedArray {
            elem: Box::new(elem),
            len,
        }
    }

    /// Vector with a `u32` length prefix (Borsh convention).
    pub fn vec(elem: Schema) -> Schema {
        Schema::Vec {
            elem: Box::new(elem),
            len_bytes: 4,
        }
    }

    /// Borsh `Option<T>`: tag byte `0` (`None`) or `1` followed by the value.
    pub fn option(inner: Schema) -> Schema {
        Schema::sum(1, [("None", 0, Schema::Unit), ("Some", 1, inner)])
    }

    /// Short type name used in error messages.
    pub fn kind(&self) -> String {
        match self {
            Schema::Uint(bits) => format!("u{bits}"),
            Schema::Int(bits) => format!("i{bits}"),
            Schema::Bool => "bool".into(),
            Schema::Unit => "unit".into(),
            Schema::FixedBytes(n) => format!("bytes{n}"),
            Schema::Address(AddressKind::Evm) => "address".into(),
            Schema::Address(AddressKind::Pubkey) => "pubkey".into(),
            Schema::Struct(_) => "struct".into(),
            Schema::FixedArray { elem, len } => format!("{}[{len}]", elem.kind()),
            Schema::Vec { elem, .. } => format!("{}[]", elem.kind()),
            Schema::Union { .. } => "union".into(),
            Schema::Ref(id) => format!("ref#{}", id.0),
        }
    }
}

/// Byte width of an integer of `bits` bits.
pub(crate) fn int_width(bits: u16) -> Result<usize, DecodeError> {
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(DecodeError::invalid_schema(format!(
            "unsupported integer width: {bits} bits"
        )));
    }
    Ok(usize::from(bits / 8))
}

fn prefix_width(bytes: u8, what: &str) -> Result<(), DecodeError> {
    if bytes == 0 || bytes > 8 {
        return Err(DecodeError::invalid_schema(format!(
            "{what} must be 1..=8 bytes, got {bytes}"
        )));
    }
    Ok(())
}

// ─── SchemaSet ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    schema: Option<Schema>,
}

/// Arena of named schemas.
///
/// Names are declared first (yielding a [`SchemaId`] usable in
/// [`Schema::Ref`]) and defined later, which is how mutually recursive
/// layouts are written down without infinite expansion.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    entries: Vec<Entry>,
    by_name: HashMap<String, SchemaId>,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id for `name`. Idempotent.
    pub fn declare(&mut self, name: impl Into<String>) -> SchemaId {
        let name = name.into();
        if let Some(id) = self.by_name.get(&name) {
            return *id;
        }
        let id = SchemaId(self.entries.len() as u32);
        self.entries.push(Entry {
            name: name.clone(),
            schema: None,
        });
        self.by_name.insert(name, id);
        id
    }

    /// Give `name` its layout. Declares the name if needed; defining the
    /// same name twice is an error.
    pub fn define(&mut self, name: impl Into<String>, schema: Schema) -> Result<SchemaId, DecodeError> {
        let name = name.into();
        let id = self.declare(name.clone());
        let entry = &mut self.entries[id.0 as usize];
        if entry.schema.is_some() {
            return Err(DecodeError::invalid_schema(format!(
                "schema '{name}' defined twice"
            )));
        }
        entry.schema = Some(schema);
        Ok(id)
    }

    pub fn id(&self, name: &str) -> Option<SchemaId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: SchemaId) -> Option<&str> {
        self.entries.get(id.0 as usize).map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the definition behind `id`.
    pub fn get(&self, id: SchemaId) -> Result<&Schema, DecodeError> {
        let entry = self
            .entries
            .get(id.0 as usize)
            .ok_or_else(|| DecodeError::invalid_schema(format!("unknown schema id {}", id.0)))?;
        entry.schema.as_ref().ok_or_else(|| {
            DecodeError::invalid_schema(format!("schema '{}' declared but never defined", entry.name))
        })
    }

    /// Look up a definition by name.
    pub fn by_name(&self, name: &str) -> Result<&Schema, DecodeError> {
        let id = self
            .id(name)
            .ok_or_else(|| DecodeError::invalid_schema(format!("unknown schema '{name}'")))?;
        self.get(id)
    }

    /// Check the whole arena: every name defined, every reference in range,
    /// integer and prefix widths supported, union discriminants unique and
    /// representable in their tag width.
    pub fn validate(&self) -> Result<(), DecodeError> {
        for entry in &self.entries {
            let schema = entry.schema.as_ref().ok_or_else(|| {
                DecodeError::invalid_schema(format!(
                    "schema '{}' declared but never defined",
                    entry.name
                ))
            })?;
            self.validate_node(schema)
                .map_err(|e| DecodeError::invalid_schema(format!("in '{}': {e}", entry.name)))?;
        }
        Ok(())
    }

    /// Validate a free-standing schema against this arena.
    pub fn validate_node(&self, schema: &Schema) -> Result<(), DecodeError> {
        match schema {
            Schema::Uint(bits) | Schema::Int(bits) => int_width(*bits).map(|_| ()),
            Schema::Bool | Schema::Unit | Schema::FixedBytes(_) | Schema::Address(_) => Ok(()),
            Schema::Struct(fields) => {
                let mut seen = HashSet::new();
                for f in fields {
                    if !seen.insert(f.name.as_str()) {
                        return Err(DecodeError::invalid_schema(format!(
                            "duplicate field '{}'",
                            f.name
                        )));
                    }
                    self.validate_node(&f.schema)?;
                }
                Ok(())
            }
            Schema::FixedArray { elem, .. } => self.validate_node(elem),
            Schema::Vec { elem, len_bytes } => {
                prefix_width(*len_bytes, "vector length prefix")?;
                self.validate_node(elem)
            }
            Schema::Union { tag_bytes, variants } => {
                prefix_width(*tag_bytes, "union tag")?;
                let max = if *tag_bytes >= 8 {
                    u64::MAX
                } else {
                    (1u64 << (8 * u32::from(*tag_bytes))) - 1
                };
                let mut tags = HashSet::new();
                let mut names = HashSet::new();
                for v in variants {
                    if v.discriminant > max {
                        return Err(DecodeError::invalid_schema(format!(
                            "variant '{}' discriminant {} exceeds {}-byte tag",
                            v.name, v.discriminant, tag_bytes
                        )));
                    }
                    if !tags.insert(v.discriminant) {
                        return Err(DecodeError::invalid_schema(format!(
                            "discriminant {} used twice",
                            v.discriminant
                        )));
                    }
                    if !names.insert(v.name.as_str()) {
                        return Err(DecodeError::invalid_schema(format!(
                            "variant '{}' declared twice",
                            v.name
                        )));
                    }
                    self.validate_node(&v.schema)?;
                }
                Ok(())
            }
            // Referenced definitions are validated on their own entry.
            Schema::Ref(id) => self.get(*id).map(|_| ()),
        }
    }

    /// Encoded size of `schema` if it is the same for every value, `None`
    /// for variable-size layouts (vectors, unions with unequal payloads,
    /// recursive references).
    pub fn static_size(&self, schema: &Schema) -> Result<Option<usize>, DecodeError> {
        self.static_size_inner(schema, &mut Vec::new())
    }

    fn static_size_inner(
        &self,
        schema: &Schema,
        visiting: &mut Vec<SchemaId>,
    ) -> Result<Option<usize>, DecodeError> {
        Ok(match schema {
            Schema::Uint(bits) | Schema::Int(bits) => Some(int_width(*bits)?),
            Schema::Bool => Some(1),
            Schema::Unit => Some(0),
            Schema::FixedBytes(n) => Some(*n),
            Schema::Address(kind) => Some(kind.width()),
            Schema::Struct(fields) => {
                let mut total = 0usize;
                for f in fields {
                    match self.static_size_inner(&f.schema, visiting)? {
                        Some(n) => total += n,
                        None => return Ok(None),
                    }
                }
                Some(total)
            }
            Schema::FixedArray { elem, len } => self
                .static_size_inner(elem, visiting)?
                .map(|n| n * len),
            Schema::Vec { .. } => None,
            Schema::Union { tag_bytes, variants } => {
                let mut size = None;
                for v in variants {
                    match self.static_size_inner(&v.schema, visiting)? {
                        Some(n) if size.is_none() || size == Some(n) => size = Some(n),
                        _ => return Ok(None),
                    }
                }
                size.map(|n| n + usize::from(*tag_bytes))
            }
            Schema::Ref(id) => {
                if visiting.contains(id) {
                    return Ok(None);
                }
                visiting.push(*id);
                let size = self.static_size_inner(self.get(*id)?, visiting)?;
                visiting.pop();
                size
            }
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
