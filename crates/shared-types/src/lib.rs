//! # Shared Types Crate
//!
//! Chain primitives used by every subsystem of the node core.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: transactions, blocks, scripts and chain
//!   parameters are defined once, here.
//! - **Consensus encoding is infallible**: every hash is taken over the
//!   [`codec`] encoding, never over a serde format.
//! - **Parameters are data**: network differences live in one
//!   [`ChainParams`] value selected by [`Network`].
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | `entities` | `OutPoint`, `TxIn`, `TxOut`, `Transaction`, `BlockHeader`, `Block` |
//! | `codec` | compact-size consensus codec |
//! | `script` | opcodes, templates, push-only checks, sigop counting |
//! | `crypto` | sha256d, keccak addresses, signature hashes, ECDSA |
//! | `target` | compact `bits` <-> `U256` target conversion |
//! | `params` | `ChainParams`, `Network` presets, checkpoints |
//! | `errors` | `DosScore` classification shared by validation errors |

pub mod codec;
pub mod crypto;
pub mod entities;
pub mod errors;
pub mod params;
pub mod script;
pub mod target;

pub use codec::{CodecError, Decodable, Encodable, Reader};
pub use crypto::{address_from_pubkey, sha256d, KeyPair, SignError};
pub use entities::*;
pub use errors::DosScore;
pub use params::{ChainParams, Network};
pub use script::{Script, ScriptKind};

// Re-export U256 from primitive-types for use across all subsystems
pub use primitive_types::U256;
