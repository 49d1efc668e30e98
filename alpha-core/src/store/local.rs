//! Local directory store mirroring the bucket layout.
//!
//! Layout: `{root}/{bucket}/ds/{dataset}/{YYYY.MM}.parquet`
//!
//! Useful for offline work against a synced copy of a bucket, and for tests.

use super::{month_from_file_name, month_object_key, dataset_prefix, MonthStore, StoreError};
use crate::catalog::{FileLocation, MonthCatalog};
use crate::credentials::StoreCredentials;
use crate::month::MonthKey;
use polars::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Store backed by a directory tree.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    /// `{root}/{bucket}/ds/{dataset}/`
    fn dataset_dir(&self, bucket: &str, dataset: &str) -> PathBuf {
        self.bucket_dir(bucket).join(dataset_prefix(dataset))
    }

    /// `{root}/{bucket}/ds/{dataset}/{month}.parquet`
    pub fn month_path(&self, bucket: &str, dataset: &str, month: &MonthKey) -> PathBuf {
        self.bucket_dir(bucket).join(month_object_key(dataset, month))
    }

    /// Write one month's table into the tree.
    ///
    /// Writes are atomic: write to .tmp then rename.
    pub fn write_month(
        &self,
        bucket: &str,
        dataset: &str,
        month: &MonthKey,
        table: &mut DataFrame,
    ) -> Result<PathBuf, StoreError> {
        let dir = self.dataset_dir(bucket, dataset);
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Io(format!("create {}: {e}", dir.display())))?;

        let path = self.month_path(bucket, dataset, month);
        let tmp_path = path.with_extension("parquet.tmp");

        let file = fs::File::create(&tmp_path)
            .map_err(|e| StoreError::Io(format!("create {}: {e}", tmp_path.display())))?;
        ParquetWriter::new(file)
            .finish(table)
            .map_err(|e| StoreError::Parquet(format!("write {}: {e}", tmp_path.display())))?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::Io(format!("atomic rename failed: {e}"))
        })?;

        Ok(path)
    }
}

impl MonthStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    fn list_months(
        &self,
        bucket: &str,
        dataset: &str,
        _credentials: Option<&StoreCredentials>,
    ) -> Result<MonthCatalog, StoreError> {
        let bucket_dir = self.bucket_dir(bucket);
        if !bucket_dir.is_dir() {
            return Err(StoreError::NotFound {
                location: bucket_dir.display().to_string(),
            });
        }

        let dir = self.dataset_dir(bucket, dataset);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            // A dataset with no files yet lists as empty, like an empty prefix.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(MonthCatalog::new()),
            Err(e) => return Err(StoreError::Io(format!("read dir {}: {e}", dir.display()))),
        };

        let mut catalog = MonthCatalog::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Io(format!("dir entry: {e}")))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(month) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(month_from_file_name)
            else {
                continue;
            };
            catalog.insert(month, FileLocation::new(path.display().to_string()));
        }

        Ok(catalog)
    }

    fn fetch_month(
        &self,
        bucket: &str,
        dataset: &str,
        month: &MonthKey,
        _credentials: Option<&StoreCredentials>,
    ) -> Result<DataFrame, StoreError> {
        let path = self.month_path(bucket, dataset, month);
        let file = fs::File::open(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound {
                location: path.display().to_string(),
            },
            _ => StoreError::Io(format!("open {}: {e}", path.display())),
        })?;

        ParquetReader::new(file)
            .finish()
            .map_err(|e| StoreError::Parquet(format!("read {}: {e}", path.display())))
    }
}
