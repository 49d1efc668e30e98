//! Storage collaborator: month listing and per-month table retrieval.
//!
//! The `MonthStore` trait abstracts over where month files live (an
//! S3-compatible bucket, a local directory, memory) so the loader can be
//! driven by any of them and mocked for tests. Stores do no caching and no
//! retries; the first failure is returned to the caller.
//!
//! All stores share one object layout:
//! `{bucket}/ds/{dataset}/{YYYY.MM}.parquet`

pub mod local;
pub mod memory;
pub mod s3;
mod sigv4;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use s3::S3Store;

use crate::catalog::MonthCatalog;
use crate::credentials::StoreCredentials;
use crate::month::MonthKey;
use polars::prelude::DataFrame;
use thiserror::Error;

/// Extension of every month file.
pub const MONTH_FILE_EXTENSION: &str = "parquet";

/// Structured errors raised by stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("object not found: {location}")]
    NotFound { location: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("store misconfigured: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("parquet decode error: {0}")]
    Parquet(String),

    #[error("store error: {0}")]
    Other(String),
}

/// A source of month-partitioned tables.
pub trait MonthStore: Send + Sync {
    /// Human-readable name of this store.
    fn name(&self) -> &str;

    /// List the months available for `dataset` in `bucket`.
    fn list_months(
        &self,
        bucket: &str,
        dataset: &str,
        credentials: Option<&StoreCredentials>,
    ) -> Result<MonthCatalog, StoreError>;

    /// Retrieve and decode one month's table.
    fn fetch_month(
        &self,
        bucket: &str,
        dataset: &str,
        month: &MonthKey,
        credentials: Option<&StoreCredentials>,
    ) -> Result<DataFrame, StoreError>;
}

/// Key prefix of a dataset inside its bucket: `ds/{dataset}/`
pub fn dataset_prefix(dataset: &str) -> String {
    format!("ds/{dataset}/")
}

/// Object key of a month file inside its bucket: `ds/{dataset}/{month}.parquet`
pub fn month_object_key(dataset: &str, month: &MonthKey) -> String {
    format!("{}{month}.{MONTH_FILE_EXTENSION}", dataset_prefix(dataset))
}

/// Catalog location of a month file: `{bucket}/ds/{dataset}/{month}.parquet`
pub fn month_location(bucket: &str, dataset: &str, month: &MonthKey) -> String {
    format!("{bucket}/{}", month_object_key(dataset, month))
}

/// Month key encoded in a file name, e.g. `2023.01.parquet` -> `2023.01`.
///
/// Only the extension is checked; the stem is kept verbatim.
pub fn month_from_file_name(file_name: &str) -> Option<MonthKey> {
    let stem = file_name.strip_suffix(&format!(".{MONTH_FILE_EXTENSION}"))?;
    (!stem.is_empty()).then(|| MonthKey::new(stem))
}
