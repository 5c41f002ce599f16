//! # chainpipe-codec
//!
//! Declarative binary codecs for on-chain payloads.
//!
//! A [`Schema`] is plain data: a tree of primitive, struct, array, union and
//! reference nodes. Named schemas live in a [`SchemaSet`], which acts as an
//! arena so a struct can refer to a union declared after it, or to itself.
//!
//! Two wire formats read and write the same schema tree:
//! - [`packed`] — Borsh-style: little-endian fixed-width integers, no
//!   padding, length-prefixed vectors, tag-prefixed unions (Solana).
//! - [`abi`] — EVM ABI words, bridged through `alloy-core`'s dynamic ABI.
//!
//! ```
//! use chainpipe_codec::{packed, Schema, SchemaSet, Value};
//!
//! let mut set = SchemaSet::new();
//! let id = set
//!     .define("Bumps", Schema::structure([("positionBump", Schema::U8)]))
//!     .unwrap();
//! let value = packed::decode_exact(&set, &Schema::Ref(id), &[7]).unwrap();
//! assert_eq!(value.field("positionBump").unwrap(), &Value::uint(7));
//! ```

pub mod abi;
pub mod address;
pub mod packed;
pub mod schema;
pub mod value;

pub use address::AddressKind;
pub use schema::{Field, Schema, SchemaId, SchemaSet, Variant};
pub use value::Value;

pub use chainpipe_core::error::DecodeError;
