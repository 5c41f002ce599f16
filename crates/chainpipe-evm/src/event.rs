//! Event signatures: topic plus the layout of indexed and data parameters.

use alloy_core::dyn_abi::DynSolType;
use chainpipe_codec::{abi, AddressKind, Schema, SchemaSet, Value};
use chainpipe_core::{block::EvmLog, decoder::Signature, error::DecodeError};
use indexmap::IndexMap;

use crate::fingerprint;

/// One parameter of an EVM event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventParam {
    pub name: String,
    pub schema: Schema,
    /// Indexed parameters live in `topics[1..]`, the rest in `data`.
    pub indexed: bool,
}

impl EventParam {
    pub fn indexed(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            indexed: true,
        }
    }

    pub fn data(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            indexed: false,
        }
    }
}

/// An immutable, fully-resolved event description.
#[derive(Debug, Clone)]
pub struct EventSignature {
    name: String,
    canonical: String,
    signature: Signature,
    params: Vec<EventParam>,
    /// Struct of the non-indexed params, in declaration order.
    data: Schema,
    set: SchemaSet,
}

impl EventSignature {
    /// Build from parameters, deriving the canonical signature string
    /// (`Name(type,...)`) and its topic.
    pub fn new(name: impl Into<String>, params: Vec<EventParam>) -> Result<Self, DecodeError> {
        Self::with_schemas(name, SchemaSet::new(), params)
    }

    /// Like [`EventSignature::new`], resolving `Schema::Ref` params through `set`.
    pub fn with_schemas(
        name: impl Into<String>,
        set: SchemaSet,
        params: Vec<EventParam>,
    ) -> Result<Self, DecodeError> {
        let name = name.into();
        let mut types = Vec::with_capacity(params.len());
        for p in &params {
            let ty = abi::sol_type(&set, &p.schema)?;
            if p.indexed && ty.is_dynamic() {
                return Err(DecodeError::invalid_schema(format!(
                    "indexed param '{}' is dynamic; declare it as bytes32",
                    p.name
                )));
            }
            types.push(ty);
        }
        let canonical = format!(
            "{name}({})",
            types
                .iter()
                .map(DynSolType::sol_type_name)
                .collect::<Vec<_>>()
                .join(",")
        );
        Ok(Self::assemble(name, canonical, set, params))
    }

    /// Build from a known canonical signature string without re-deriving it.
    /// Schemas are only checked when a log is decoded.
    pub fn from_parts(name: impl Into<String>, canonical: impl Into<String>, params: Vec<EventParam>) -> Self {
        Self::assemble(name.into(), canonical.into(), SchemaSet::new(), params)
    }

    fn assemble(name: String, canonical: String, set: SchemaSet, params: Vec<EventParam>) -> Self {
        let data = Schema::structure(
            params
                .iter()
                .filter(|p| !p.indexed)
                .map(|p| (p.name.clone(), p.schema.clone())),
        );
        let signature = Signature::Topic(fingerprint::keccak256_signature(&canonical));
        Self {
            name,
            canonical,
            signature,
            params,
            data,
            set,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// e.g. `"Transfer(address,address,uint256)"`.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// `0x`-prefixed lowercase topic0.
    pub fn topic(&self) -> String {
        self.signature.as_hex()
    }

    pub fn params(&self) -> &[EventParam] {
        &self.params
    }

    fn indexed_count(&self) -> usize {
        self.params.iter().filter(|p| p.indexed).count()
    }

    /// Topic0 equals this event's topic and the log carries exactly one
    /// topic per indexed parameter. The arity check keeps ERC-721
    /// `Transfer` (same topic, tokenId indexed) out of ERC-20 decoding.
    pub fn matches(&self, log: &EvmLog) -> bool {
        let Signature::Topic(topic) = &self.signature else {
            return false;
        };
        log.topic0().is_some_and(|t| t.eq_ignore_ascii_case(topic))
            && log.topics.len() == 1 + self.indexed_count()
    }

    /// Decode all parameters into a struct value, in declaration order.
    pub fn decode(&self, log: &EvmLog) -> Result<Value, DecodeError> {
        let expected = 1 + self.indexed_count();
        if log.topics.len() != expected {
            return Err(DecodeError::malformed(format!(
                "{} expects {expected} topics, log has {}",
                self.name,
                log.topics.len()
            )));
        }

        let data = abi::decode_params(&self.set, &self.data, &log.data)?;
        let mut data_fields = match data {
            Value::Struct(fields) => fields,
            other => {
                return Err(DecodeError::TypeMismatch {
                    expected: "struct".into(),
                    got: other.kind().into(),
                })
            }
        };

        let mut topics = log.topics[1..].iter();
        let mut out = IndexMap::with_capacity(self.params.len());
        for p in &self.params {
            let value = if p.indexed {
                let topic = topics.next().ok_or_else(|| DecodeError::MissingField {
                    field: p.name.clone(),
                })?;
                let word = fingerprint::topic_bytes(topic)?;
                abi::decode_word(&self.set, &p.schema, &word)?
            } else {
                data_fields
                    .shift_remove(&p.name)
                    .ok_or_else(|| DecodeError::MissingField {
                        field: p.name.clone(),
                    })?
            };
            out.insert(p.name.clone(), value);
        }
        Ok(Value::Struct(out))
    }
}

/// Canonical (EIP-55 checksummed) form of an EVM address string.
pub fn checksum_address(address: &str) -> Result<String, DecodeError> {
    let raw = AddressKind::Evm.parse(address)?;
    AddressKind::Evm.format(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainpipe_codec::abi::encode_params;

    fn transfer() -> EventSignature {
        EventSignature::new(
            "Transfer",
            vec![
                EventParam::indexed("from", Schema::EVM_ADDRESS),
                EventParam::indexed("to", Schema::EVM_ADDRESS),
                EventParam::data("value", Schema::U256),
            ],
        )
        .unwrap()
    }

    fn log(topics: &[&str], data: Vec<u8>) -> EvmLog {
        EvmLog {
            address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".into(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
            data,
            transaction_hash: "0xabc".into(),
            transaction_index: 0,
            log_index: 0,
        }
    }

    const FROM: &str = "0x000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045";
    const TO: &str = "0x0000000000000000000000001111111111111111111111111111111111111111";

    #[test]
    fn derives_canonical_signature_and_topic() {
        let ev = transfer();
        assert_eq!(ev.canonical(), "Transfer(address,address,uint256)");
        assert_eq!(
            ev.topic(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn decodes_topics_and_data_in_param_order() {
        let ev = transfer();
        let set = SchemaSet::new();
        let data = encode_params(
            &set,
            &Schema::structure([("value", Schema::U256)]),
            &Value::structure([("value", Value::uint(1_000_000))]),
        )
        .unwrap();
        let l = log(&[ev.topic().as_str(), FROM, TO], data);
        assert!(ev.matches(&l));
        let v = ev.decode(&l).unwrap();
        let Value::Struct(fields) = &v else { panic!("not a struct") };
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["from", "to", "value"]);
        assert_eq!(
            v.field("from").unwrap().as_address().unwrap(),
            "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"
        );
        assert_eq!(v.field("value").unwrap().to_u128().unwrap(), 1_000_000);
    }

    #[test]
    fn wrong_arity_does_not_match() {
        let ev = transfer();
        // ERC-721 Transfer: same topic, tokenId indexed, empty data.
        let l = log(&[ev.topic().as_str(), FROM, TO, FROM], vec![]);
        assert!(!ev.matches(&l));
        assert!(ev.decode(&l).unwrap_err().is_malformed());
    }

    #[test]
    fn topic_match_is_case_insensitive() {
        let ev = transfer();
        let upper = ev.topic().to_uppercase().replacen("0X", "0x", 1);
        assert!(ev.matches(&log(&[upper.as_str(), FROM, TO], vec![])));
    }

    #[test]
    fn dynamic_indexed_param_rejected() {
        let err = EventSignature::new(
            "Named",
            vec![EventParam::indexed("tags", Schema::vec(Schema::U8))],
        )
        .unwrap_err();
        assert!(err.to_string().contains("bytes32"));
    }

    #[test]
    fn from_parts_agrees_with_derived() {
        let derived = transfer();
        let given = EventSignature::from_parts(
            "Transfer",
            "Transfer(address,address,uint256)",
            derived.params().to_vec(),
        );
        assert_eq!(given.signature(), derived.signature());
    }

    #[test]
    fn checksum_normalizes_case() {
        assert_eq!(
            checksum_address("0xd8da6bf26964af9d7eed9e03e53415d37aa96045").unwrap(),
            "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"
        );
        assert!(checksum_address("0x12").is_err());
    }
}
