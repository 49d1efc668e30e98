//! Alpha Core — month-partitioned price datasets.
//!
//! Daily price data for stocks, ETFs, indices and cryptocurrencies is stored
//! one Parquet file per calendar month. This crate:
//! - Maps asset families to their dataset identifiers
//! - Lists the months a dataset holds (the month catalog)
//! - Resolves a requested month range and rejects ranges with gaps
//! - Fetches each month and stacks the tables in chronological order
//!
//! Storage is behind the [`store::MonthStore`] trait, with S3-compatible,
//! local-directory and in-memory implementations.

pub mod asset;
pub mod catalog;
pub mod credentials;
pub mod loader;
pub mod month;
pub mod store;

pub use asset::AssetType;
pub use catalog::{FileLocation, MonthCatalog};
pub use credentials::StoreCredentials;
pub use loader::{load, LoadError, LoadSummary, RangeLoader, ResolvedRange};
pub use month::{MonthKey, MonthRange};
pub use store::{LocalStore, MemoryStore, MonthStore, S3Store, StoreError};
