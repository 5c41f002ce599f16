//! `EvmLogDecoder` — the `BlockDecoder` for EVM log protocols.

use std::collections::HashMap;
use std::sync::Arc;

use chainpipe_core::{
    block::{EvmBlock, EvmLog},
    chain::ChainFamily,
    decoder::{BlockDecoder, Decoded, EntryDecoder, EntryFailure, EntryResult},
    error::StreamError,
    event::TxRef,
    query::{DataQuery, FieldSelection, LogFilter},
};

use crate::erc20::{Erc20Transfer, Erc20TransferDecoder};
use crate::matcher;
use crate::uniswap::{UniswapV3Swap, UniswapV3SwapDecoder};

pub type SharedLogDecoder<P> = Arc<dyn EntryDecoder<EvmLog, Output = P>>;

/// Dispatches the logs of a block to per-event decoders by topic0.
///
/// Several decoders may share a topic (ERC-20 and ERC-721 `Transfer`);
/// the first whose `matches` accepts the log wins.
pub struct EvmLogDecoder<P> {
    name: String,
    decoders: Vec<SharedLogDecoder<P>>,
    by_topic: HashMap<String, Vec<usize>>,
    contracts: Vec<String>,
}

impl<P> EvmLogDecoder<P> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decoders: Vec::new(),
            by_topic: HashMap::new(),
            contracts: Vec::new(),
        }
    }

    /// Register a decoder for one event kind.
    pub fn with_decoder<D>(self, decoder: D) -> Self
    where
        D: EntryDecoder<EvmLog, Output = P> + 'static,
    {
        self.with_shared(Arc::new(decoder))
    }

    pub fn with_shared(mut self, decoder: SharedLogDecoder<P>) -> Self {
        let topic = decoder.signature().as_hex();
        self.by_topic.entry(topic).or_default().push(self.decoders.len());
        self.decoders.push(decoder);
        self
    }

    /// Only accept logs emitted by these contracts. Empty means any.
    pub fn with_contracts<I, S>(mut self, contracts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contracts.extend(contracts.into_iter().map(Into::into));
        self
    }

    /// Topic and address filter covering every registered decoder.
    pub fn filter(&self) -> LogFilter {
        let mut topics: Vec<String> = self.by_topic.keys().cloned().collect();
        topics.sort();
        topics
            .into_iter()
            .fold(LogFilter::default(), |f, t| f.topic0(t))
            .addresses(self.contracts.iter().cloned())
    }

    fn decoder_for(&self, log: &EvmLog) -> Option<&SharedLogDecoder<P>> {
        let topic = log.topic0()?.to_ascii_lowercase();
        self.by_topic
            .get(&topic)?
            .iter()
            .map(|i| &self.decoders[*i])
            .find(|d| d.matches(log))
    }
}

impl EvmLogDecoder<Erc20Transfer> {
    /// ERC-20 transfers, optionally restricted to `contracts`.
    pub fn erc20_transfers() -> Self {
        Self::new("erc20-transfers").with_decoder(Erc20TransferDecoder::new())
    }
}

impl EvmLogDecoder<UniswapV3Swap> {
    /// Uniswap V3 swaps, optionally restricted to pool addresses.
    pub fn uniswap_v3_swaps() -> Self {
        Self::new("uniswap-v3-swaps").with_decoder(UniswapV3SwapDecoder::new())
    }
}

fn transaction_hash(block: &EvmBlock, log: &EvmLog) -> Result<String, StreamError> {
    if !log.transaction_hash.is_empty() {
        return Ok(log.transaction_hash.clone());
    }
    block
        .transactions
        .iter()
        .find(|tx| tx.transaction_index == log.transaction_index)
        .map(|tx| tx.hash.clone())
        .ok_or(StreamError::MissingTransaction {
            block_number: block.header.number,
            tx_index: log.transaction_index,
        })
}

impl<P: Send + 'static> BlockDecoder for EvmLogDecoder<P> {
    type Block = EvmBlock;
    type Payload = P;

    fn name(&self) -> &str {
        &self.name
    }

    fn query(&self) -> DataQuery {
        let fields = FieldSelection::default()
            .with_block_header()
            .with_transaction(&["transactionIndex", "hash"])
            .with_log(&[
                "address",
                "topics",
                "data",
                "transactionHash",
                "transactionIndex",
                "logIndex",
            ]);
        DataQuery::new(ChainFamily::Evm, fields).log(self.filter())
    }

    fn decode_block(&self, block: &EvmBlock) -> Result<Vec<EntryResult<P>>, StreamError> {
        let filter = self.filter();
        let mut logs: Vec<&EvmLog> = matcher::select_logs(&block.logs, &filter).collect();
        logs.sort_by_key(|l| (l.transaction_index, l.log_index));

        let mut out = Vec::with_capacity(logs.len());
        for log in logs {
            let Some(decoder) = self.decoder_for(log) else {
                continue;
            };
            let entry = match decoder.decode(log) {
                Ok(payload) => Ok(Decoded {
                    payload,
                    transaction: TxRef::new(transaction_hash(block, log)?, log.transaction_index),
                    entry_index: log.log_index,
                }),
                Err(error) => Err(EntryFailure {
                    decoder: decoder.name().to_string(),
                    tx_index: log.transaction_index,
                    entry_index: log.log_index,
                    error,
                }),
            };
            out.push(entry);
        }
        Ok(out)
    }
}
