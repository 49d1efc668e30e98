//! Asset families and the dataset identifiers that address them in the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which dataset family to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Stocks,
    Etfs,
    Indices,
    Cryptocurrencies,
}

impl AssetType {
    /// Every asset type, in a stable order.
    pub const ALL: [AssetType; 4] = [
        AssetType::Stocks,
        AssetType::Etfs,
        AssetType::Indices,
        AssetType::Cryptocurrencies,
    ];

    /// Dataset identifier used as the repository segment of object paths.
    pub fn dataset(self) -> &'static str {
        match self {
            AssetType::Stocks => "stocks-daily-price",
            AssetType::Etfs => "etfs-daily-price",
            AssetType::Indices => "indices-daily-price",
            AssetType::Cryptocurrencies => "cryptocurrencies-daily-price",
        }
    }

    /// Short lowercase name, as accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            AssetType::Stocks => "stocks",
            AssetType::Etfs => "etfs",
            AssetType::Indices => "indices",
            AssetType::Cryptocurrencies => "cryptocurrencies",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dataset())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown asset type '{0}' (valid: stocks, etfs, indices, cryptocurrencies)")]
pub struct ParseAssetTypeError(pub String);

impl FromStr for AssetType {
    type Err = ParseAssetTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "stocks" | "stock" => Ok(AssetType::Stocks),
            "etfs" | "etf" => Ok(AssetType::Etfs),
            "indices" | "index" => Ok(AssetType::Indices),
            "cryptocurrencies" | "crypto" => Ok(AssetType::Cryptocurrencies),
            other => AssetType::ALL
                .into_iter()
                .find(|a| a.dataset() == other)
                .ok_or_else(|| ParseAssetTypeError(s.to_string())),
        }
    }
}
