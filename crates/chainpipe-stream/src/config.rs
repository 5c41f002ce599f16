//! Pipeline configuration.

use serde::{Deserialize, Serialize};

/// What the pipeline does with a matched entry that fails to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeErrorPolicy {
    /// Stop the stream with `StreamError::Decode`.
    #[default]
    Fail,
    /// Log the failure and drop the entry.
    Skip,
}

/// Configuration for a single pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Key under which the checkpoint store keeps this pipeline's offset.
    #[serde(default = "default_id")]
    pub id: String,
    /// First block to request when neither an explicit nor a persisted
    /// offset exists.
    #[serde(default)]
    pub from_block: Option<u64>,
    /// Exclusive upper bound. `None` streams until cancelled.
    #[serde(default)]
    pub to_block: Option<u64>,
    #[serde(default)]
    pub on_decode_error: DecodeErrorPolicy,
}

fn default_id() -> String {
    "default".into()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            id: default_id(),
            from_block: None,
            to_block: None,
            on_decode_error: DecodeErrorPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn from_block(mut self, block: u64) -> Self {
        self.from_block = Some(block);
        self
    }

    pub fn to_block(mut self, block: u64) -> Self {
        self.to_block = Some(block);
        self
    }

    pub fn on_decode_error(mut self, policy: DecodeErrorPolicy) -> Self {
        self.on_decode_error = policy;
        self
    }
}
