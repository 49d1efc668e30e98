//! In-memory store, for tests and for callers that already hold month tables.

use super::{month_location, MonthStore, StoreError};
use crate::catalog::{FileLocation, MonthCatalog};
use crate::credentials::StoreCredentials;
use crate::month::MonthKey;
use polars::prelude::DataFrame;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

type DatasetKey = (String, String);

/// Month tables held in memory, keyed by bucket and dataset.
///
/// Every fetch is recorded so callers can check which months were read and in
/// what order.
#[derive(Default)]
pub struct MemoryStore {
    tables: HashMap<DatasetKey, BTreeMap<MonthKey, DataFrame>>,
    failing_months: HashSet<MonthKey>,
    fetch_log: Mutex<Vec<MonthKey>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) one month's table.
    pub fn with_month(
        mut self,
        bucket: &str,
        dataset: &str,
        month: impl Into<MonthKey>,
        table: DataFrame,
    ) -> Self {
        self.insert(bucket, dataset, month, table);
        self
    }

    pub fn insert(&mut self, bucket: &str, dataset: &str, month: impl Into<MonthKey>, table: DataFrame) {
        self.tables
            .entry((bucket.to_string(), dataset.to_string()))
            .or_default()
            .insert(month.into(), table);
    }

    /// Make fetches of `month` fail with a network error, while it stays listed.
    pub fn with_fetch_failure(mut self, month: impl Into<MonthKey>) -> Self {
        self.failing_months.insert(month.into());
        self
    }

    /// Months fetched so far, in call order.
    pub fn fetched(&self) -> Vec<MonthKey> {
        self.fetch_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub fn clear_fetch_log(&self) {
        if let Ok(mut log) = self.fetch_log.lock() {
            log.clear();
        }
    }
}

impl MonthStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn list_months(
        &self,
        bucket: &str,
        dataset: &str,
        _credentials: Option<&StoreCredentials>,
    ) -> Result<MonthCatalog, StoreError> {
        let key = (bucket.to_string(), dataset.to_string());
        Ok(self
            .tables
            .get(&key)
            .map(|months| {
                months
                    .keys()
                    .map(|m| {
                        (
                            m.clone(),
                            FileLocation::new(month_location(bucket, dataset, m)),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_month(
        &self,
        bucket: &str,
        dataset: &str,
        month: &MonthKey,
        _credentials: Option<&StoreCredentials>,
    ) -> Result<DataFrame, StoreError> {
        if let Ok(mut log) = self.fetch_log.lock() {
            log.push(month.clone());
        }

        if self.failing_months.contains(month) {
            return Err(StoreError::NetworkUnreachable(format!(
                "simulated failure fetching {month}"
            )));
        }

        let key = (bucket.to_string(), dataset.to_string());
        self.tables
            .get(&key)
            .and_then(|months| months.get(month))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                location: month_location(bucket, dataset, month),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn one_row(value: i64) -> DataFrame {
        df!("value" => [value]).unwrap()
    }

    #[test]
    fn lists_only_the_requested_dataset() {
        let store = MemoryStore::new()
            .with_month("alpha", "stocks-daily-price", "2023.01", one_row(1))
            .with_month("alpha", "etfs-daily-price", "2023.02", one_row(2));

        let catalog = store.list_months("alpha", "stocks-daily-price", None).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.get(&"2023.01".into()).unwrap().as_str(),
            "alpha/ds/stocks-daily-price/2023.01.parquet"
        );
        assert!(store.list_months("beta", "stocks-daily-price", None).unwrap().is_empty());
    }

    #[test]
    fn fetch_records_calls_and_reports_missing() {
        let store = MemoryStore::new().with_month("alpha", "ds", "2023.01", one_row(1));

        assert_eq!(store.fetch_month("alpha", "ds", &"2023.01".into(), None).unwrap().height(), 1);
        let err = store.fetch_month("alpha", "ds", &"2023.02".into(), None).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(store.fetched(), vec![MonthKey::new("2023.01"), MonthKey::new("2023.02")]);
    }

    #[test]
    fn injected_failure_keeps_month_listed() {
        let store = MemoryStore::new()
            .with_month("alpha", "ds", "2023.01", one_row(1))
            .with_fetch_failure("2023.01");

        assert!(store.list_months("alpha", "ds", None).unwrap().contains(&"2023.01".into()));
        assert!(matches!(
            store.fetch_month("alpha", "ds", &"2023.01".into(), None),
            Err(StoreError::NetworkUnreachable(_))
        ));
    }
}
