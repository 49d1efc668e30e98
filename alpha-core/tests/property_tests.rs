//! Property tests for month arithmetic and range loading.
//!
//! Uses proptest to verify:
//! 1. Expected months are contiguous, chronological and lexicographically sorted
//! 2. A gap-free catalog loads every month, in order
//! 3. A sub-range loads exactly its own months
//! 4. Removing any month inside the range is reported as that month

use alpha_core::month::expected_months;
use alpha_core::store::MemoryStore;
use alpha_core::{AssetType, LoadError, MonthKey, MonthRange, RangeLoader};
use polars::prelude::*;
use proptest::prelude::*;

const BUCKET: &str = "alpha";

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_month() -> impl Strategy<Value = MonthKey> {
    (1990..2040i32, 1..=12u32).prop_map(|(y, m)| MonthKey::from_year_month(y, m).unwrap())
}

/// `n` consecutive months starting at `start`.
fn consecutive(start: &MonthKey, n: usize) -> Vec<MonthKey> {
    let mut months = vec![start.clone()];
    while months.len() < n {
        let next = months.last().unwrap().succ().unwrap();
        months.push(next);
    }
    months
}

/// Catalog of one-row tables whose value is the month's index in `months`.
fn store_for(months: &[MonthKey]) -> MemoryStore {
    let mut store = MemoryStore::new();
    for (i, m) in months.iter().enumerate() {
        let table = df!("month" => [m.as_str()], "value" => [i as i64]).unwrap();
        store.insert(BUCKET, AssetType::Stocks.dataset(), m.clone(), table);
    }
    store
}

fn month_column(df: &DataFrame) -> Vec<String> {
    df.column("month")
        .unwrap()
        .str()
        .unwrap()
        .into_no_null_iter()
        .map(String::from)
        .collect()
}

// ── 1. Month sequence ────────────────────────────────────────────────

proptest! {
    #[test]
    fn expected_months_are_contiguous(start in arb_month(), n in 1usize..120) {
        let months = consecutive(&start, n);
        let end = months.last().unwrap();

        let expected = expected_months(&start, end).unwrap();
        prop_assert_eq!(expected.len(), n);
        prop_assert_eq!(&expected, &months);
        for pair in expected.windows(2) {
            prop_assert!(pair[0] < pair[1]);
            prop_assert_eq!(pair[0].succ(), Some(pair[1].clone()));
        }
    }

    #[test]
    fn lexicographic_order_is_chronological(a in arb_month(), b in arb_month()) {
        let (ya, ma) = a.year_month().unwrap();
        let (yb, mb) = b.year_month().unwrap();
        prop_assert_eq!(a.cmp(&b), (ya, ma).cmp(&(yb, mb)));
    }
}

// ── 2–4. Loading ─────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn gap_free_catalog_loads_every_month(start in arb_month(), n in 1usize..36) {
        let months = consecutive(&start, n);
        let store = store_for(&months);

        let df = RangeLoader::new(&store)
            .load(AssetType::Stocks, BUCKET, None, None)
            .unwrap();

        prop_assert_eq!(df.height(), n);
        let loaded = month_column(&df);
        let expected: Vec<String> = months.iter().map(|m| m.to_string()).collect();
        prop_assert_eq!(loaded, expected);
    }

    #[test]
    fn sub_range_loads_only_its_months(
        start in arb_month(),
        n in 2usize..36,
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
    ) {
        let months = consecutive(&start, n);
        let store = store_for(&months);
        let (lo, hi) = {
            let (x, y) = (a.index(n), b.index(n));
            (x.min(y), x.max(y))
        };
        let range = MonthRange::new(months[lo].clone(), months[hi].clone());

        let df = RangeLoader::new(&store)
            .load(AssetType::Stocks, BUCKET, Some(&range), None)
            .unwrap();

        let expected: Vec<String> = months[lo..=hi].iter().map(|m| m.to_string()).collect();
        prop_assert_eq!(month_column(&df), expected);
    }

    #[test]
    fn any_removed_month_is_reported(
        start in arb_month(),
        n in 3usize..36,
        hole in any::<prop::sample::Index>(),
    ) {
        let months = consecutive(&start, n);
        // Keep both ends so the inferred range still spans the hole.
        let hole = 1 + hole.index(n - 2);
        let mut present = months.clone();
        let removed = present.remove(hole);
        let store = store_for(&present);

        let err = RangeLoader::new(&store)
            .load(AssetType::Stocks, BUCKET, None, None)
            .unwrap_err();

        match err {
            LoadError::MissingMonth { month } => prop_assert_eq!(month, removed),
            other => prop_assert!(false, "expected MissingMonth, got {:?}", other),
        }
        prop_assert!(store.fetched().is_empty());
    }
}
