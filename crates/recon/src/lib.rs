//! `shopsync-recon`: stock vs. webshop reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded tables, returns classified
//! buckets. No file or CLI dependencies.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod join;
pub mod model;
pub mod normalize;
pub mod summary;
pub mod threshold;

pub use config::RunConfig;
pub use engine::run;
pub use error::{ReconError, SchemaError};
pub use model::{Bucket, ClassifiedRecord, RawTable, RunInput, RunReport};
