//! Transformers that replace team and run identifiers with pseudonyms.
//!
//! - [`RecordTransformer`]: JSON report records with content fingerprints
//! - [`MetadataTransformer`]: per-run metadata lines
//! - [`TableTransformer`]: whitespace-delimited evaluation tables
//!
//! All three work against a [`Session`], which owns the mapping store, the
//! repair rules, the issue collector and the decision callback.

pub mod decide;
pub mod email;
pub mod error;
pub mod issues;
pub mod metadata;
pub mod records;
pub mod repair;
pub mod session;
pub mod table;

pub use decide::{AutoDecider, Decider, ScriptedDecider};
pub use email::{find_emails, redact_emails};
pub use error::{Result, TransformError};
pub use issues::{EmailFinding, IssueCollector};
pub use metadata::{MetadataTransformer, metadata_runtag};
pub use records::{RecordOutput, RecordTransformer};
pub use repair::FieldCheck;
pub use session::{Location, Session};
pub use table::{TableLayout, TableOutput, TableTransformer, TranslationPolicy};
