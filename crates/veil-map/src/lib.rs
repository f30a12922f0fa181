//! Pseudonym issuance and persistent identity mappings.
//!
//! [`MappingStore`] owns the original-to-pseudonym tables, content
//! fingerprints and pool cursors. [`RepairStore`] keeps remembered repair
//! decisions in the same database file.

pub mod error;
pub mod hash;
pub mod pool;
pub mod repairs;
pub mod store;

pub use error::{MapError, Result};
pub use hash::{fingerprint, is_fingerprint, pattern_hash, sha256_hex};
pub use pool::{PLANTIMALS, PseudonymPool, TEAM_POOL_SIZE};
pub use repairs::{RepairOption, RepairStore, suggest_repair_options};
pub use store::{InvalidatedName, MappingStore};
