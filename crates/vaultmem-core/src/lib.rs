//! # vaultmem-core
//!
//! Foundation crate for the vaultmem memory store.
//! Defines the record model, config, errors, constants, and the seam
//! traits (`Embedder`, location types) every other crate depends on.

pub mod config;
pub mod constants;
pub mod errors;
pub mod record;
pub mod traits;

pub use config::VaultConfig;
pub use errors::{VaultError, VaultResult};
pub use record::{HashAlgorithm, Location, Memory, Record, RecordKind, Relationship};
pub use traits::Embedder;
