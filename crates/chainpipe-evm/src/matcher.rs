//! Log selection: topic0 and emitting-contract allow-list.

use chainpipe_core::{block::EvmLog, query::LogFilter};

use crate::fingerprint;

/// Logs whose topic0 is one of `filter.topic0` and whose emitting address
/// is in `filter.address`. Comparisons ignore hex case; an empty list
/// matches everything. Logs without a well-formed topic0 never match.
pub fn select_logs<'a>(logs: &'a [EvmLog], filter: &'a LogFilter) -> impl Iterator<Item = &'a EvmLog> + 'a {
    logs.iter().filter(move |log| {
        fingerprint::from_topics(&log.topics).is_some_and(|t| filter.matches_topic0(t))
            && filter.matches_address(&log.address)
    })
}
