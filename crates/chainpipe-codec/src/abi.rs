//! EVM ABI bridge.
//!
//! Maps the subset of [`Schema`] expressible in Solidity onto alloy's
//! `DynSolType`, so event data and indexed topics decode through the same
//! schema tree as packed Solana payloads. Unions, unit payloads and Solana
//! public keys have no ABI form and are rejected as invalid schemas.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, B256, I256, U256};
use chainpipe_core::error::DecodeError;
use indexmap::IndexMap;

use crate::address::AddressKind;
use crate::schema::{int_width, Schema, SchemaSet};
use crate::value::Value;

/// Width of one ABI word (and of one EVM log topic).
pub const WORD: usize = 32;

const MAX_DEPTH: usize = 64;

/// Resolve `schema` into the equivalent alloy dynamic type.
pub fn sol_type(set: &SchemaSet, schema: &Schema) -> Result<DynSolType, DecodeError> {
    sol_type_at(set, schema, 0)
}

fn sol_type_at(set: &SchemaSet, schema: &Schema, depth: usize) -> Result<DynSolType, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::invalid_schema(
            "recursive schema has no ABI representation",
        ));
    }
    Ok(match schema {
        Schema::Uint(bits) => {
            int_width(*bits)?;
            DynSolType::Uint(usize::from(*bits))
        }
        Schema::Int(bits) => {
            int_width(*bits)?;
            DynSolType::Int(usize::from(*bits))
        }
        Schema::Bool => DynSolType::Bool,
        Schema::FixedBytes(n) if (1..=WORD).contains(n) => DynSolType::FixedBytes(*n),
        Schema::Address(AddressKind::Evm) => DynSolType::Address,
        Schema::Struct(fields) => DynSolType::Tuple(
            fields
                .iter()
                .map(|f| sol_type_at(set, &f.schema, depth + 1))
                .collect::<Result<_, _>>()?,
        ),
        Schema::FixedArray { elem, len } => {
            DynSolType::FixedArray(Box::new(sol_type_at(set, elem, depth + 1)?), *len)
        }
        Schema::Vec { elem, .. } => DynSolType::Array(Box::new(sol_type_at(set, elem, depth + 1)?)),
        Schema::Ref(id) => sol_type_at(set, set.get(*id)?, depth + 1)?,
        other => {
            return Err(DecodeError::invalid_schema(format!(
                "{} has no ABI representation",
                other.kind()
            )))
        }
    })
}

// ─── Decoding ─────────────────────────────────────────────────────────────────

/// Decode ABI-encoded call or event data laid out as the parameters of
/// `schema` (normally a struct, one field per non-indexed parameter).
pub fn decode_params(set: &SchemaSet, schema: &Schema, data: &[u8]) -> Result<Value, DecodeError> {
    let ty = sol_type(set, schema)?;
    let decoded = ty
        .abi_decode_params(data)
        .map_err(|e| DecodeError::malformed(format!("abi data: {e}")))?;
    from_sol(set, schema, decoded, 0)
}

/// Decode a single 32-byte word, such as an indexed event topic.
///
/// Dynamic types (strings, arrays) are stored in topics as their keccak
/// hash; declare those parameters as `FixedBytes(32)`.
pub fn decode_word(set: &SchemaSet, schema: &Schema, word: &[u8]) -> Result<Value, DecodeError> {
    if word.len() != WORD {
        return Err(DecodeError::malformed(format!(
            "abi word must be {WORD} bytes, got {}",
            word.len()
        )));
    }
    let ty = sol_type(set, schema)?;
    if ty.is_dynamic() {
        return Err(DecodeError::invalid_schema(format!(
            "{} does not fit in one abi word",
            schema.kind()
        )));
    }
    let decoded = ty
        .abi_decode(word)
        .map_err(|e| DecodeError::malformed(format!("abi word: {e}")))?;
    from_sol(set, schema, decoded, 0)
}

fn from_sol(set: &SchemaSet, schema: &Schema, value: DynSolValue, depth: usize) -> Result<Value, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::invalid_schema(
            "recursive schema has no ABI representation",
        ));
    }
    match (schema, value) {
        (Schema::Uint(_), DynSolValue::Uint(u, _)) => Ok(Value::Uint(u)),
        (Schema::Int(_), DynSolValue::Int(i, _)) => Ok(Value::Int(i)),
        (Schema::Bool, DynSolValue::Bool(b)) => Ok(Value::Bool(b)),
        (Schema::FixedBytes(n), DynSolValue::FixedBytes(word, _)) => Ok(Value::Bytes(word[..*n].to_vec())),
        (Schema::Address(_), DynSolValue::Address(a)) => Ok(Value::Address(a.to_checksum(None))),
        (Schema::Struct(fields), DynSolValue::Tuple(vals)) => {
            if fields.len() != vals.len() {
                return Err(DecodeError::malformed(format!(
                    "expected {} abi params, decoded {}",
                    fields.len(),
                    vals.len()
                )));
            }
            let mut out = IndexMap::with_capacity(fields.len());
            for (f, v) in fields.iter().zip(vals) {
                out.insert(f.name.clone(), from_sol(set, &f.schema, v, depth + 1)?);
            }
            Ok(Value::Struct(out))
        }
        (Schema::FixedArray { elem, .. }, DynSolValue::FixedArray(items))
        | (Schema::Vec { elem, .. }, DynSolValue::Array(items)) => items
            .into_iter()
            .map(|v| from_sol(set, elem, v, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (Schema::Ref(id), v) => from_sol(set, set.get(*id)?, v, depth + 1),
        (schema, v) => Err(DecodeError::TypeMismatch {
            expected: schema.kind(),
            got: format!("{:?}", v.as_type()),
        }),
    }
}

// ─── Encoding ─────────────────────────────────────────────────────────────────

/// ABI-encode `value` as a parameter list (inverse of [`decode_params`]).
pub fn encode_params(set: &SchemaSet, schema: &Schema, value: &Value) -> Result<Vec<u8>, DecodeError> {
    Ok(to_sol(set, schema, value, 0)?.abi_encode_params())
}

/// ABI-encode a static value into a single 32-byte word.
pub fn encode_word(set: &SchemaSet, schema: &Schema, value: &Value) -> Result<[u8; WORD], DecodeError> {
    let bytes = to_sol(set, schema, value, 0)?.abi_encode();
    <[u8; WORD]>::try_from(bytes.as_slice()).map_err(|_| {
        DecodeError::invalid_schema(format!("{} does not fit in one abi word", schema.kind()))
    })
}

fn to_sol(set: &SchemaSet, schema: &Schema, value: &Value, depth: usize) -> Result<DynSolValue, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::invalid_schema(
            "recursive schema has no ABI representation",
        ));
    }
    let mismatch = || DecodeError::TypeMismatch {
        expected: schema.kind(),
        got: value.kind().into(),
    };
    match (schema, value) {
        (Schema::Uint(bits), Value::Uint(u)) => {
            int_width(*bits)?;
            if u.bit_len() > usize::from(*bits) {
                return Err(DecodeError::TypeMismatch {
                    expected: format!("u{bits}"),
                    got: u.to_string(),
                });
            }
            Ok(DynSolValue::Uint(*u, usize::from(*bits)))
        }
        (Schema::Int(bits), Value::Int(i)) => {
            let width = int_width(*bits)?;
            if width < WORD {
                let bound = I256::from_raw(U256::from(1u8) << (usize::from(*bits) - 1));
                if *i >= bound || *i < -bound {
                    return Err(DecodeError::TypeMismatch {
                        expected: format!("i{bits}"),
                        got: i.to_string(),
                    });
                }
            }
            Ok(DynSolValue::Int(*i, usize::from(*bits)))
        }
        (Schema::Bool, Value::Bool(b)) => Ok(DynSolValue::Bool(*b)),
        (Schema::FixedBytes(n), Value::Bytes(b)) if b.len() == *n && *n <= WORD => {
            let mut word = B256::ZERO;
            word[..*n].copy_from_slice(b);
            Ok(DynSolValue::FixedBytes(word, *n))
        }
        (Schema::Address(AddressKind::Evm), Value::Address(a)) => {
            let raw = AddressKind::Evm.parse(a)?;
            Ok(DynSolValue::Address(Address::from_slice(&raw)))
        }
        (Schema::Struct(fields), Value::Struct(values)) => fields
            .iter()
            .map(|f| {
                let v = values.get(&f.name).ok_or_else(|| DecodeError::MissingField {
                    field: f.name.clone(),
                })?;
                to_sol(set, &f.schema, v, depth + 1)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(DynSolValue::Tuple),
        (Schema::FixedArray { elem, len }, Value::Array(items)) => {
            if items.len() != *len {
                return Err(mismatch());
            }
            items
                .iter()
                .map(|v| to_sol(set, elem, v, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::FixedArray)
        }
        (Schema::Vec { elem, .. }, Value::Array(items)) => items
            .iter()
            .map(|v| to_sol(set, elem, v, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(DynSolValue::Array),
        (Schema::Ref(id), v) => to_sol(set, set.get(*id)?, v, depth + 1),
        (Schema::Union { .. } | Schema::Unit | Schema::Address(AddressKind::Pubkey), _) => {
            Err(DecodeError::invalid_schema(format!(
                "{} has no ABI representation",
                schema.kind()
            )))
        }
        _ => Err(mismatch()),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
