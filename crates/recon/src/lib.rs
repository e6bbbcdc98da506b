//! `nepse-recon`: multi-source record reconciliation.
//!
//! Pure engine crate: receives pre-scraped tables, returns merged rows with
//! derived fields. No network IO.

pub mod config;
pub mod derived;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod index;
pub mod model;
pub mod numeric;
pub mod source;

pub use config::ReconConfig;
pub use engine::{run, Reconciler};
pub use error::ReconError;
pub use index::SecondaryIndex;
pub use model::{Cell, Derived, MergedRecord, ReconInput, ReconResult, ReconSchema, SourceRecord};
