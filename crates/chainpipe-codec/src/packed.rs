//! Packed little-endian wire format (Borsh layout).
//!
//! - integers: `bits / 8` bytes, little-endian, two's complement when signed
//! - bool: one byte, `0` or `1`
//! - struct: fields back to back, no padding
//! - fixed array: `len` elements back to back
//! - vector: unsigned length prefix of `len_bytes`, then the elements;
//!   a non-empty vector of zero-sized elements does not decode
//! - union: unsigned tag of `tag_bytes`, then the variant payload
//!
//! Decoding never yields a partial value: on any mismatch the whole call
//! fails with [`DecodeError::MalformedPayload`].

use alloy_primitives::{I256, U256};
use bytes::{Buf, BufMut};
use chainpipe_core::error::DecodeError;
use indexmap::IndexMap;

use crate::schema::{int_width, Schema, SchemaId, SchemaSet};
use crate::value::Value;

/// Deepest nesting of schema nodes followed while decoding or encoding.
/// Guards against self-referential layouts that never consume input.
pub const MAX_DEPTH: usize = 64;

// ─── Decoding ─────────────────────────────────────────────────────────────────

/// Decode one value from the front of `buf`, advancing it.
pub fn decode<B: Buf>(set: &SchemaSet, schema: &Schema, buf: &mut B) -> Result<Value, DecodeError> {
    Decoder { set, buf }.value(schema, 0)
}

/// Decode one value from the start of `bytes`; returns the value and the
/// number of bytes consumed. Trailing bytes are left alone.
pub fn decode_prefix(set: &SchemaSet, schema: &Schema, bytes: &[u8]) -> Result<(Value, usize), DecodeError> {
    let mut buf = bytes;
    let value = decode(set, schema, &mut buf)?;
    Ok((value, bytes.len() - buf.remaining()))
}

/// Decode `bytes` as exactly one value; trailing bytes are an error.
pub fn decode_exact(set: &SchemaSet, schema: &Schema, bytes: &[u8]) -> Result<Value, DecodeError> {
    let (value, consumed) = decode_prefix(set, schema, bytes)?;
    if consumed != bytes.len() {
        return Err(DecodeError::malformed(format!(
            "{} trailing bytes after {}",
            bytes.len() - consumed,
            schema.kind()
        )));
    }
    Ok(value)
}

struct Decoder<'a, B> {
    set: &'a SchemaSet,
    buf: &'a mut B,
}

impl<'a, B: Buf> Decoder<'a, B> {
    fn take(&mut self, n: usize) -> Result<Vec<u8>, DecodeError> {
        if self.buf.remaining() < n {
            return Err(DecodeError::malformed(format!(
                "needed {n} bytes, {} remaining",
                self.buf.remaining()
            )));
        }
        let mut out = vec![0u8; n];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    fn word(&mut self, width: usize, signed: bool) -> Result<U256, DecodeError> {
        let bytes = self.take(width)?;
        let mut word = [0u8; 32];
        word[..width].copy_from_slice(&bytes);
        if signed && width < 32 && bytes[width - 1] & 0x80 != 0 {
            word[width..].fill(0xff);
        }
        Ok(U256::from_le_bytes(word))
    }

    /// Unsigned prefix (vector length, union tag) of up to 8 bytes.
    fn prefix(&mut self, width: u8) -> Result<u64, DecodeError> {
        if width == 0 || width > 8 {
            return Err(DecodeError::invalid_schema(format!(
                "prefix width {width} out of range"
            )));
        }
        let bytes = self.take(usize::from(width))?;
        let mut le = [0u8; 8];
        le[..bytes.len()].copy_from_slice(&bytes);
        Ok(u64::from_le_bytes(le))
    }

    /// Fail fast when a run of `count` elements cannot fit. Elements without
    /// a static size still take at least one byte each.
    fn ensure_fits(&self, elem: &Schema, count: u64) -> Result<(), DecodeError> {
        let size = self.set.static_size(elem).ok().flatten().unwrap_or(1);
        let needed = (size as u128) * u128::from(count);
        if needed > self.buf.remaining() as u128 {
            return Err(DecodeError::malformed(format!(
                "{count} x {} needs {needed} bytes, {} remaining",
                elem.kind(),
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    /// Resolve a reference; an undefined target is a payload error here.
    fn resolve(&self, id: SchemaId) -> Result<&'a Schema, DecodeError> {
        self.set
            .get(id)
            .map_err(|e| DecodeError::malformed(format!("undefined reference: {e}")))
    }

    fn value(&mut self, schema: &Schema, depth: usize) -> Result<Value, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::malformed(format!(
                "schema nesting deeper than {MAX_DEPTH}"
            )));
        }
        match schema {
            Schema::Uint(bits) => Ok(Value::Uint(self.word(int_width(*bits)?, false)?)),
            Schema::Int(bits) => Ok(Value::Int(I256::from_raw(
                self.word(int_width(*bits)?, true)?,
            ))),
            Schema::Bool => match self.take(1)?[0] {
                0 => Ok(Value::Bool(false)),
                1 => Ok(Value::Bool(true)),
                b => Err(DecodeError::malformed(format!("invalid bool byte {b}"))),
            },
            Schema::Unit => Ok(Value::Unit),
            Schema::FixedBytes(n) => Ok(Value::Bytes(self.take(*n)?)),
            Schema::Address(kind) => {
                let raw = self.take(kind.width())?;
                Ok(Value::Address(kind.format(&raw)?))
            }
            Schema::Struct(fields) => {
                let mut out = IndexMap::with_capacity(fields.len());
                for f in fields {
                    out.insert(f.name.clone(), self.value(&f.schema, depth + 1)?);
                }
                Ok(Value::Struct(out))
            }
            Schema::FixedArray { elem, len } => {
                self.ensure_fits(elem, *len as u64)?;
                let items = (0..*len)
                    .map(|_| self.value(elem, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(items))
            }
            Schema::Vec { elem, len_bytes } => {
                let len = self.prefix(*len_bytes)?;
                // A length prefix alone must not drive allocation.
                if len > 0 && self.set.static_size(elem).ok().flatten() == Some(0) {
                    return Err(DecodeError::malformed(format!(
                        "vector of {len} zero-sized {} elements",
                        elem.kind()
                    )));
                }
                self.ensure_fits(elem, len)?;
                let cap = usize::try_from(len)
                    .unwrap_or(usize::MAX)
                    .min(self.buf.remaining());
                let mut items = Vec::with_capacity(cap);
                for _ in 0..len {
                    items.push(self.value(elem, depth + 1)?);
                }
                Ok(Value::Array(items))
            }
            Schema::Union { tag_bytes, variants } => {
                let tag = self.prefix(*tag_bytes)?;
                let variant = variants
                    .iter()
                    .find(|v| v.discriminant == tag)
                    .ok_or_else(|| DecodeError::malformed(format!("unknown union discriminant {tag}")))?;
                let value = self.value(&variant.schema, depth + 1)?;
                Ok(Value::Enum {
                    variant: variant.name.clone(),
                    value: Box::new(value),
                })
            }
            Schema::Ref(id) => {
                let target = self.resolve(*id)?;
                self.value(target, depth + 1)
            }
        }
    }
}

// ─── Encoding ─────────────────────────────────────────────────────────────────

/// Encode `value` according to `schema` into `sink`; returns bytes written.
pub fn encode<B: BufMut>(
    set: &SchemaSet,
    schema: &Schema,
    value: &Value,
    sink: &mut B,
) -> Result<usize, DecodeError> {
    let mut out = Vec::new();
    Encoder { set, out: &mut out }.value(schema, value, 0)?;
    sink.put_slice(&out);
    Ok(out.len())
}

/// Encode into a fresh byte vector.
pub fn encode_to_vec(set: &SchemaSet, schema: &Schema, value: &Value) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    encode(set, schema, value, &mut out)?;
    Ok(out)
}

struct Encoder<'a> {
    set: &'a SchemaSet,
    out: &'a mut Vec<u8>,
}

fn mismatch(schema: &Schema, value: &Value) -> DecodeError {
    DecodeError::TypeMismatch {
        expected: schema.kind(),
        got: value.kind().into(),
    }
}

impl Encoder<'_> {
    fn prefix(&mut self, width: u8, n: u64) -> Result<(), DecodeError> {
        if width == 0 || width > 8 {
            return Err(DecodeError::invalid_schema(format!(
                "prefix width {width} out of range"
            )));
        }
        let le = n.to_le_bytes();
        let width = usize::from(width);
        if le[width..].iter().any(|b| *b != 0) {
            return Err(DecodeError::TypeMismatch {
                expected: format!("{width}-byte prefix"),
                got: n.to_string(),
            });
        }
        self.out.put_slice(&le[..width]);
        Ok(())
    }

    fn uint(&mut self, bits: u16, u: U256) -> Result<(), DecodeError> {
        let width = int_width(bits)?;
        if u.bit_len() > usize::from(bits) {
            return Err(DecodeError::TypeMismatch {
                expected: format!("u{bits}"),
                got: u.to_string(),
            });
        }
        self.out.put_slice(&u.to_le_bytes::<32>()[..width]);
        Ok(())
    }

    fn int(&mut self, bits: u16, i: I256) -> Result<(), DecodeError> {
        let width = int_width(bits)?;
        let le = i.into_raw().to_le_bytes::<32>();
        let fill = if i.is_negative() { 0xff } else { 0x00 };
        let sign_ok = (le[width - 1] & 0x80 != 0) == i.is_negative();
        if !sign_ok || le[width..].iter().any(|b| *b != fill) {
            return Err(DecodeError::TypeMismatch {
                expected: format!("i{bits}"),
                got: i.to_string(),
            });
        }
        self.out.put_slice(&le[..width]);
        Ok(())
    }

    fn value(&mut self, schema: &Schema, value: &Value, depth: usize) -> Result<(), DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::malformed(format!(
                "schema nesting deeper than {MAX_DEPTH}"
            )));
        }
        match (schema, value) {
            (Schema::Uint(bits), Value::Uint(u)) => self.uint(*bits, *u),
            (Schema::Int(bits), Value::Int(i)) => self.int(*bits, *i),
            (Schema::Bool, Value::Bool(b)) => {
                self.out.put_u8(u8::from(*b));
                Ok(())
            }
            (Schema::Unit, Value::Unit) => Ok(()),
            (Schema::FixedBytes(n), Value::Bytes(b)) => {
                if b.len() != *n {
                    return Err(DecodeError::TypeMismatch {
                        expected: format!("bytes{n}"),
                        got: format!("{} bytes", b.len()),
                    });
                }
                self.out.put_slice(b);
                Ok(())
            }
            (Schema::Address(kind), Value::Address(a)) => {
                let raw = kind.parse(a)?;
                self.out.put_slice(&raw);
                Ok(())
            }
            (Schema::Struct(fields), Value::Struct(values)) => {
                for f in fields {
                    let v = values.get(&f.name).ok_or_else(|| DecodeError::MissingField {
                        field: f.name.clone(),
                    })?;
                    self.value(&f.schema, v, depth + 1)?;
                }
                Ok(())
            }
            (Schema::FixedArray { elem, len }, Value::Array(items)) => {
                if items.len() != *len {
                    return Err(DecodeError::TypeMismatch {
                        expected: format!("{len} elements"),
                        got: format!("{} elements", items.len()),
                    });
                }
                items.iter().try_for_each(|v| self.value(elem, v, depth + 1))
            }
            (Schema::Vec { elem, len_bytes }, Value::Array(items)) => {
                self.prefix(*len_bytes, items.len() as u64)?;
                items.iter().try_for_each(|v| self.value(elem, v, depth + 1))
            }
            (Schema::Union { tag_bytes, variants }, Value::Enum { variant, value }) => {
                let v = variants
                    .iter()
                    .find(|v| &v.name == variant)
                    .ok_or_else(|| DecodeError::TypeMismatch {
                        expected: "declared union variant".into(),
                        got: variant.clone(),
                    })?;
                self.prefix(*tag_bytes, v.discriminant)?;
                self.value(&v.schema, value, depth + 1)
            }
            (Schema::Ref(id), v) => {
                let target = self.set.get(*id)?;
                self.value(target, v, depth + 1)
            }
            (schema, value) => Err(mismatch(schema, value)),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
