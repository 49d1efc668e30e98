//! Range loader: resolve a month range against the catalog, check it has no
//! gaps, fetch every month and stack the tables in chronological order.
//!
//! Pipeline: list → resolve bounds → expected months → validate → fetch → merge.
//!
//! The expected months are generated from the two bounds alone, never from the
//! catalog keys, so a hole in the catalog is always reported instead of being
//! skipped. Validation finishes before the first fetch: a gap costs no
//! downloads.

use crate::asset::AssetType;
use crate::catalog::MonthCatalog;
use crate::credentials::StoreCredentials;
use crate::month::{expected_months, MonthKey, MonthRange};
use crate::store::{MonthStore, StoreError};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading a month range.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("missing month {month} in the requested range")]
    MissingMonth { month: MonthKey },

    #[error("no months available for dataset '{dataset}' in bucket '{bucket}', cannot infer a range")]
    EmptyCatalog { bucket: String, dataset: String },

    #[error("range {start}..={end} contains no months")]
    EmptyRange { start: MonthKey, end: MonthKey },

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("failed to merge month tables: {0}")]
    Merge(String),
}

impl LoadError {
    /// The month reported as missing, if this is a gap error.
    pub fn missing_month(&self) -> Option<&MonthKey> {
        match self {
            LoadError::MissingMonth { month } => Some(month),
            _ => None,
        }
    }
}

/// What a load resolved to and produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub asset: AssetType,
    pub bucket: String,
    pub start: MonthKey,
    pub end: MonthKey,
    pub months: Vec<MonthKey>,
    pub rows: usize,
    /// Fingerprint of the catalog the load was resolved against.
    pub catalog_fingerprint: String,
}

/// Months a load will read, validated against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRange {
    pub start: MonthKey,
    pub end: MonthKey,
    pub months: Vec<MonthKey>,
    pub catalog: MonthCatalog,
}

/// Loads contiguous month ranges through a [`MonthStore`].
///
/// Holds no state between calls; every load lists the catalog afresh.
pub struct RangeLoader<'a> {
    store: &'a dyn MonthStore,
}

impl<'a> RangeLoader<'a> {
    pub fn new(store: &'a dyn MonthStore) -> Self {
        Self { store }
    }

    /// List the catalog and work out which months a load would read, without
    /// fetching any of them.
    pub fn resolve(
        &self,
        asset: AssetType,
        bucket: &str,
        range: Option<&MonthRange>,
        credentials: Option<&StoreCredentials>,
    ) -> Result<ResolvedRange, LoadError> {
        let dataset = asset.dataset();
        let catalog = self.store.list_months(bucket, dataset, credentials)?;

        let (start, end) = match range {
            Some(r) => (r.start.clone(), r.end.clone()),
            None => match (catalog.first(), catalog.last()) {
                (Some(first), Some(last)) => (first.clone(), last.clone()),
                _ => {
                    return Err(LoadError::EmptyCatalog {
                        bucket: bucket.to_string(),
                        dataset: dataset.to_string(),
                    })
                }
            },
        };

        // A bound that is not a `YYYY.MM` key can never match a catalog entry.
        let months = match expected_months(&start, &end) {
            Ok(months) => months,
            Err(malformed) if malformed == start => {
                return Err(LoadError::MissingMonth { month: start })
            }
            Err(malformed) => {
                return Err(LoadError::MissingMonth {
                    month: first_missing_before(&catalog, &start, &malformed),
                })
            }
        };
        if months.is_empty() {
            return Err(LoadError::EmptyRange { start, end });
        }

        if let Some(missing) = months.iter().find(|m| !catalog.contains(m)) {
            return Err(LoadError::MissingMonth {
                month: missing.clone(),
            });
        }

        tracing::debug!(
            store = self.store.name(),
            bucket,
            dataset,
            %start,
            %end,
            months = months.len(),
            "resolved month range"
        );

        Ok(ResolvedRange {
            start,
            end,
            months,
            catalog,
        })
    }

    /// Load and merge every month in `range` (or the whole catalog).
    pub fn load(
        &self,
        asset: AssetType,
        bucket: &str,
        range: Option<&MonthRange>,
        credentials: Option<&StoreCredentials>,
    ) -> Result<DataFrame, LoadError> {
        self.load_with_summary(asset, bucket, range, credentials)
            .map(|(df, _)| df)
    }

    /// Same as [`load`](Self::load), also reporting what was read.
    pub fn load_with_summary(
        &self,
        asset: AssetType,
        bucket: &str,
        range: Option<&MonthRange>,
        credentials: Option<&StoreCredentials>,
    ) -> Result<(DataFrame, LoadSummary), LoadError> {
        let resolved = self.resolve(asset, bucket, range, credentials)?;
        let dataset = asset.dataset();

        let mut tables = Vec::with_capacity(resolved.months.len());
        for month in &resolved.months {
            let table = self.store.fetch_month(bucket, dataset, month, credentials)?;
            tracing::debug!(%month, rows = table.height(), "fetched month");
            tables.push(table);
        }

        let merged = merge_tables(tables)?;
        tracing::info!(
            dataset,
            start = %resolved.start,
            end = %resolved.end,
            rows = merged.height(),
            "loaded month range"
        );

        let summary = LoadSummary {
            asset,
            bucket: bucket.to_string(),
            start: resolved.start,
            end: resolved.end,
            months: resolved.months,
            rows: merged.height(),
            catalog_fingerprint: resolved.catalog.fingerprint(),
        };
        Ok((merged, summary))
    }
}

/// Stack month tables in the given order, keeping each table's rows as-is.
///
/// Column mismatches are reported by polars and surface as [`LoadError::Merge`].
pub fn merge_tables(tables: Vec<DataFrame>) -> Result<DataFrame, LoadError> {
    let mut iter = tables.into_iter();
    let Some(mut merged) = iter.next() else {
        return Err(LoadError::Merge("no tables to merge".into()));
    };
    for table in iter {
        merged
            .vstack_mut(&table)
            .map_err(|e| LoadError::Merge(e.to_string()))?;
    }
    merged.as_single_chunk_par();
    Ok(merged)
}

/// First month from `start` missing in `catalog` that sorts before the
/// malformed bound `end`; `end` itself when every such month is present.
fn first_missing_before(catalog: &MonthCatalog, start: &MonthKey, end: &MonthKey) -> MonthKey {
    let mut cursor = Some(start.clone());
    while let Some(month) = cursor {
        if &month >= end {
            break;
        }
        if !catalog.contains(&month) {
            return month;
        }
        cursor = month.succ();
    }
    end.clone()
}

/// Load `asset` from `bucket` over `range` (the whole catalog when `None`).
pub fn load(
    store: &dyn MonthStore,
    asset: AssetType,
    bucket: &str,
    range: Option<&MonthRange>,
    credentials: Option<&StoreCredentials>,
) -> Result<DataFrame, LoadError> {
    RangeLoader::new(store).load(asset, bucket, range, credentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use polars::prelude::*;

    const BUCKET: &str = "alpha";

    fn month_row(month: &str) -> DataFrame {
        let mm: i64 = month[5..].parse().unwrap();
        let date = format!("{}-{}-01", &month[..4], &month[5..]);
        df!("date" => [date.as_str()], "value" => [mm]).unwrap()
    }

    fn store_with(months: &[&str]) -> MemoryStore {
        months.iter().fold(MemoryStore::new(), |store, m| {
            store.with_month(BUCKET, AssetType::Stocks.dataset(), *m, month_row(m))
        })
    }

    fn values(df: &DataFrame) -> Vec<i64> {
        df.column("value")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn whole_catalog_by_default() {
        let store = store_with(&["2023.01", "2023.02", "2023.03"]);
        let df = RangeLoader::new(&store)
            .load(AssetType::Stocks, BUCKET, None, None)
            .unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(values(&df), [1, 2, 3]);
    }

    #[test]
    fn explicit_sub_range() {
        let store = store_with(&["2023.01", "2023.02", "2023.03"]);
        let range = MonthRange::new("2023.02", "2023.03");
        let df = RangeLoader::new(&store)
            .load(AssetType::Stocks, BUCKET, Some(&range), None)
            .unwrap();
        assert_eq!(values(&df), [2, 3]);
    }

    #[test]
    fn gap_reports_first_missing_month_without_fetching() {
        let store = store_with(&["2023.01", "2023.03", "2023.05"]);
        let err = RangeLoader::new(&store)
            .load(AssetType::Stocks, BUCKET, None, None)
            .unwrap_err();
        assert_eq!(err.missing_month(), Some(&MonthKey::new("2023.02")));
        assert!(store.fetched().is_empty());
    }

    #[test]
    fn empty_catalog_without_range() {
        let store = MemoryStore::new();
        let err = RangeLoader::new(&store)
            .load(AssetType::Etfs, BUCKET, None, None)
            .unwrap_err();
        match err {
            LoadError::EmptyCatalog { bucket, dataset } => {
                assert_eq!(bucket, BUCKET);
                assert_eq!(dataset, "etfs-daily-price");
            }
            other => panic!("expected EmptyCatalog, got {other:?}"),
        }
    }

    #[test]
    fn empty_catalog_with_range_is_missing_month() {
        let store = MemoryStore::new();
        let range = MonthRange::single("2023.01");
        let err = RangeLoader::new(&store)
            .load(AssetType::Stocks, BUCKET, Some(&range), None)
            .unwrap_err();
        assert_eq!(err.missing_month(), Some(&MonthKey::new("2023.01")));
    }

    #[test]
    fn inverted_range_is_empty_range() {
        let store = store_with(&["2023.01", "2023.02"]);
        let range = MonthRange::new("2023.02", "2023.01");
        let err = RangeLoader::new(&store)
            .load(AssetType::Stocks, BUCKET, Some(&range), None)
            .unwrap_err();
        assert!(matches!(err, LoadError::EmptyRange { .. }));
    }

    #[test]
    fn day_level_bound_is_missing_month() {
        let store = store_with(&["2023.01", "2023.02"]);
        let range = MonthRange::new("2023.01.15", "2023.02");
        let err = RangeLoader::new(&store)
            .load(AssetType::Stocks, BUCKET, Some(&range), None)
            .unwrap_err();
        assert_eq!(err.missing_month(), Some(&MonthKey::new("2023.01.15")));
    }

    #[test]
    fn missing_start_reported_before_malformed_end() {
        let store = store_with(&["2023.01", "2023.02"]);
        let range = MonthRange::new("2022.12", "2023.02.15");
        let err = RangeLoader::new(&store)
            .load(AssetType::Stocks, BUCKET, Some(&range), None)
            .unwrap_err();
        assert_eq!(err.missing_month(), Some(&MonthKey::new("2022.12")));
        assert!(store.fetched().is_empty());
    }

    #[test]
    fn malformed_end_reported_when_earlier_months_present() {
        let store = store_with(&["2023.01", "2023.02", "2023.03"]);
        let range = MonthRange::new("2023.01", "2023.02.15");
        let err = RangeLoader::new(&store)
            .load(AssetType::Stocks, BUCKET, Some(&range), None)
            .unwrap_err();
        assert_eq!(err.missing_month(), Some(&MonthKey::new("2023.02.15")));
    }

    #[test]
    fn merged_table_is_a_single_chunk() {
        let months: Vec<String> = (1..=12).map(|m| format!("2023.{m:02}")).collect();
        let refs: Vec<&str> = months.iter().map(String::as_str).collect();
        let store = store_with(&refs);
        let df = RangeLoader::new(&store)
            .load(AssetType::Stocks, BUCKET, None, None)
            .unwrap();
        assert_eq!(df.height(), 12);
        assert_eq!(df.max_n_chunks(), 1);
    }

    #[test]
    fn fetch_failure_aborts_remaining_fetches() {
        let store = store_with(&["2023.01", "2023.02", "2023.03"]).with_fetch_failure("2023.02");
        let err = RangeLoader::new(&store)
            .load(AssetType::Stocks, BUCKET, None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::Storage(StoreError::NetworkUnreachable(_))
        ));
        assert_eq!(
            store.fetched(),
            vec![MonthKey::new("2023.01"), MonthKey::new("2023.02")]
        );
    }

    #[test]
    fn mismatched_columns_fail_merge() {
        let store = MemoryStore::new()
            .with_month(BUCKET, "stocks-daily-price", "2023.01", df!("value" => [1i64]).unwrap())
            .with_month(BUCKET, "stocks-daily-price", "2023.02", df!("price" => [2.0f64]).unwrap());
        let err = RangeLoader::new(&store)
            .load(AssetType::Stocks, BUCKET, None, None)
            .unwrap_err();
        assert!(matches!(err, LoadError::Merge(_)));
    }

    #[test]
    fn rows_within_a_month_keep_their_order() {
        let store = MemoryStore::new()
            .with_month(BUCKET, "stocks-daily-price", "2023.01", df!("value" => [3i64, 1, 2]).unwrap())
            .with_month(BUCKET, "stocks-daily-price", "2023.02", df!("value" => [9i64, 9]).unwrap());
        let df = RangeLoader::new(&store)
            .load(AssetType::Stocks, BUCKET, None, None)
            .unwrap();
        assert_eq!(values(&df), [3, 1, 2, 9, 9]);
    }

    #[test]
    fn summary_describes_the_load() {
        let store = store_with(&["2022.12", "2023.01"]);
        let (df, summary) = RangeLoader::new(&store)
            .load_with_summary(AssetType::Stocks, BUCKET, None, None)
            .unwrap();
        assert_eq!(summary.rows, df.height());
        assert_eq!(summary.start.as_str(), "2022.12");
        assert_eq!(summary.end.as_str(), "2023.01");
        assert_eq!(summary.months.len(), 2);
        assert_eq!(summary.catalog_fingerprint.len(), 64);
    }

    #[test]
    fn resolve_does_not_fetch() {
        let store = store_with(&["2023.01", "2023.02"]);
        let resolved = RangeLoader::new(&store)
            .resolve(AssetType::Stocks, BUCKET, None, None)
            .unwrap();
        assert_eq!(resolved.months.len(), 2);
        assert!(store.fetched().is_empty());
    }

    #[test]
    fn merge_of_nothing_is_an_error() {
        assert!(matches!(merge_tables(Vec::new()), Err(LoadError::Merge(_))));
    }
}
