pub mod report;

use crate::loader::{
    records_from_frame, CUSTOMER_ID, LEGACY_PRODUCT, MIGRATED_PRODUCT, SI_REASON_CODE,
};
use crate::structures::{
    ImpactedPattern, MigrationRecord, MismatchStats, PatternCount, ProductPairCount, ReasonCount,
};
use anyhow::{Context, Result};
use polars::lazy::dsl::{col, len};
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::{info, instrument};

const COUNT: &str = "count";

pub fn mismatch_rate_pct(mismatches: usize, total_rows: usize) -> f64 {
    if total_rows > 0 {
        mismatches as f64 / total_rows as f64 * 100.0
    } else {
        0.0
    }
}

pub fn kpi_text(stats: &MismatchStats) -> String {
    format!(
        "Total customers: {}\nTotal mismatches: {}\nMismatch rate: {:.2} percent",
        stats.total_rows, stats.total_mismatches, stats.mismatch_rate_pct
    )
}

/// Mismatch counts per group of `keys`, largest first, ties by key ascending.
fn grouped_counts(mismatches: &DataFrame, keys: &[&str]) -> Result<DataFrame> {
    let by: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();

    let mut sort_by = vec![COUNT.to_string()];
    sort_by.extend(keys.iter().map(|k| k.to_string()));
    let mut descending = vec![true];
    descending.extend(keys.iter().map(|_| false));

    let df = mismatches
        .clone()
        .lazy()
        .group_by(by)
        .agg([len().cast(DataType::Int64).alias(COUNT)])
        .sort(
            sort_by,
            SortMultipleOptions::default().with_order_descending_multi(descending),
        )
        .collect()
        .with_context(|| format!("Failed to group mismatches by {}", keys.join(", ")))?;
    Ok(df)
}

struct CountTable<'a> {
    df: &'a DataFrame,
    counts: &'a Int64Chunked,
}

impl<'a> CountTable<'a> {
    fn new(df: &'a DataFrame) -> Result<Self> {
        Ok(Self {
            df,
            counts: df.column(COUNT)?.i64()?,
        })
    }

    fn rows(&self) -> std::ops::Range<usize> {
        0..self.df.height()
    }

    fn key(&self, name: &str, i: usize) -> Result<String> {
        Ok(self.df.column(name)?.str()?.get(i).unwrap_or_default().to_string())
    }

    fn count(&self, i: usize) -> u64 {
        self.counts.get(i).unwrap_or(0).max(0) as u64
    }
}

fn reason_counts(mismatches: &DataFrame) -> Result<Vec<ReasonCount>> {
    let df = grouped_counts(mismatches, &[SI_REASON_CODE])?;
    let table = CountTable::new(&df)?;
    table
        .rows()
        .map(|i| {
            Ok(ReasonCount {
                si_reason_code: table.key(SI_REASON_CODE, i)?,
                count: table.count(i),
            })
        })
        .collect()
}

fn pair_counts(mismatches: &DataFrame) -> Result<Vec<ProductPairCount>> {
    let df = grouped_counts(mismatches, &[LEGACY_PRODUCT, MIGRATED_PRODUCT])?;
    let table = CountTable::new(&df)?;
    table
        .rows()
        .map(|i| {
            Ok(ProductPairCount {
                legacy_product: table.key(LEGACY_PRODUCT, i)?,
                migrated_product: table.key(MIGRATED_PRODUCT, i)?,
                count: table.count(i),
            })
        })
        .collect()
}

fn pattern_counts(mismatches: &DataFrame) -> Result<Vec<PatternCount>> {
    let df = grouped_counts(mismatches, &[LEGACY_PRODUCT, MIGRATED_PRODUCT, SI_REASON_CODE])?;
    let table = CountTable::new(&df)?;
    table
        .rows()
        .map(|i| {
            Ok(PatternCount {
                legacy_product: table.key(LEGACY_PRODUCT, i)?,
                migrated_product: table.key(MIGRATED_PRODUCT, i)?,
                si_reason_code: table.key(SI_REASON_CODE, i)?,
                count: table.count(i),
            })
        })
        .collect()
}

fn impacted_patterns(records: &[MigrationRecord]) -> Vec<ImpactedPattern> {
    let mut groups: BTreeMap<(&str, &str, &str), Vec<String>> = BTreeMap::new();
    for r in records {
        groups
            .entry((
                r.legacy_product.as_str(),
                r.migrated_product.as_str(),
                r.si_reason_code.as_str(),
            ))
            .or_default()
            .push(r.customer_id.clone());
    }

    groups
        .into_iter()
        .map(|((legacy, migrated, reason), customer_ids)| ImpactedPattern {
            legacy_product: legacy.to_string(),
            migrated_product: migrated.to_string(),
            si_reason_code: reason.to_string(),
            customer_ids,
        })
        .collect()
}

/// Computes mismatch volume, rate and groupings for a normalized migration frame.
#[instrument(skip(df), fields(rows = df.height()))]
pub fn compute_stats(df: &DataFrame) -> Result<MismatchStats> {
    let total_rows = df.height();

    let mismatch_df = df
        .clone()
        .lazy()
        .filter(col(LEGACY_PRODUCT).neq(col(MIGRATED_PRODUCT)))
        .select([
            col(CUSTOMER_ID),
            col(LEGACY_PRODUCT),
            col(MIGRATED_PRODUCT),
            col(SI_REASON_CODE),
        ])
        .collect()
        .context("Failed to filter mismatching rows")?;

    let total_mismatches = mismatch_df.height();
    if total_mismatches == 0 {
        info!(total_rows, "no mismatches detected");
        return Ok(MismatchStats::without_mismatches(total_rows));
    }

    let mismatches = records_from_frame(&mismatch_df)?;
    debug_assert!(mismatches.iter().all(MigrationRecord::is_mismatch));
    let stats = MismatchStats {
        total_rows,
        total_mismatches,
        mismatch_rate_pct: mismatch_rate_pct(total_mismatches, total_rows),
        by_reason: reason_counts(&mismatch_df)?,
        by_pair: pair_counts(&mismatch_df)?,
        patterns: pattern_counts(&mismatch_df)?,
        impacted: impacted_patterns(&mismatches),
        mismatches,
    };

    info!(
        total_rows,
        total_mismatches,
        mismatch_rate_pct = stats.mismatch_rate_pct,
        reason_codes = stats.by_reason.len(),
        product_pairs = stats.by_pair.len(),
        patterns = stats.patterns.len(),
        "mismatch stats computed"
    );
    if let Some(top) = stats.patterns.first() {
        info!(pattern = %top, count = top.count, "top mismatch pattern");
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::normalize_frame;

    fn frame(rows: &[(&str, &str, &str, &str)]) -> DataFrame {
        let raw = df!(
            "customer_id" => rows.iter().map(|r| r.0).collect::<Vec<_>>(),
            "legacy_product" => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
            "migrated_product" => rows.iter().map(|r| r.2).collect::<Vec<_>>(),
            "si_reason_code" => rows.iter().map(|r| r.3).collect::<Vec<_>>()
        )
        .unwrap();
        normalize_frame(raw).unwrap()
    }

    fn sample() -> DataFrame {
        frame(&[
            ("C1", "GAS_STD", "GAS_STD", "R0"),
            ("C2", "ELEC_FIX", "ELEC_VAR", "R2"),
            ("C3", "ELEC_FIX", "ELEC_VAR", "R2"),
            ("C4", "GAS_STD", "GAS_GREEN", "R1"),
            ("C5", "ELEC_FIX", "ELEC_VAR", "R1"),
            ("C6", "ELEC_FIX", "ELEC_FIX", "R0"),
            ("C7", "GAS_STD", "GAS_GREEN", "R2"),
            ("C8", "ELEC_FIX", "ELEC_VAR", "R2"),
        ])
    }

    #[test]
    fn rate_is_zero_without_rows() {
        assert_eq!(mismatch_rate_pct(0, 0), 0.0);
        assert_eq!(mismatch_rate_pct(1, 4), 25.0);
    }

    #[test]
    fn counts_mismatches_and_rate() {
        let stats = compute_stats(&sample()).unwrap();
        assert_eq!(stats.total_rows, 8);
        assert_eq!(stats.total_mismatches, 6);
        assert!((stats.mismatch_rate_pct - 75.0).abs() < 1e-9);
        let ids: Vec<_> = stats.mismatches.iter().map(|r| r.customer_id.as_str()).collect();
        assert_eq!(ids, ["C2", "C3", "C4", "C5", "C7", "C8"]);
    }

    #[test]
    fn groups_by_reason_largest_first() {
        let stats = compute_stats(&sample()).unwrap();
        assert_eq!(
            stats.by_reason,
            vec![
                ReasonCount { si_reason_code: "R2".into(), count: 4 },
                ReasonCount { si_reason_code: "R1".into(), count: 2 },
            ]
        );
    }

    #[test]
    fn groups_by_product_pair() {
        let stats = compute_stats(&sample()).unwrap();
        assert_eq!(stats.by_pair.len(), 2);
        assert_eq!(stats.by_pair[0].legacy_product, "ELEC_FIX");
        assert_eq!(stats.by_pair[0].migrated_product, "ELEC_VAR");
        assert_eq!(stats.by_pair[0].count, 4);
        assert_eq!(stats.by_pair[1].migrated_product, "GAS_GREEN");
        assert_eq!(stats.by_pair[1].count, 2);
    }

    #[test]
    fn pattern_ties_break_on_key() {
        let stats = compute_stats(&sample()).unwrap();
        let got: Vec<(String, u64)> = stats
            .patterns
            .iter()
            .map(|p| (p.to_string(), p.count))
            .collect();
        assert_eq!(
            got,
            vec![
                ("ELEC_FIX -> ELEC_VAR [R2]".to_string(), 3),
                ("ELEC_FIX -> ELEC_VAR [R1]".to_string(), 1),
                ("GAS_STD -> GAS_GREEN [R1]".to_string(), 1),
                ("GAS_STD -> GAS_GREEN [R2]".to_string(), 1),
            ]
        );
    }

    #[test]
    fn impacted_customers_keep_input_order_per_pattern() {
        let stats = compute_stats(&sample()).unwrap();
        assert_eq!(stats.impacted.len(), 4);
        let elec_r2 = stats
            .impacted
            .iter()
            .find(|p| p.migrated_product == "ELEC_VAR" && p.si_reason_code == "R2")
            .unwrap();
        assert_eq!(elec_r2.customer_ids, ["C2", "C3", "C8"]);
        assert_eq!(stats.impacted[0].si_reason_code, "R1");
        assert_eq!(stats.impacted[0].customer_ids, ["C5"]);
    }

    #[test]
    fn all_matching_rows_take_the_empty_path() {
        let stats = compute_stats(&frame(&[
            ("C1", "GAS_STD", "GAS_STD", "R0"),
            ("C2", "ELEC_FIX", "ELEC_FIX", "R0"),
        ]))
        .unwrap();
        assert!(!stats.has_mismatches());
        assert_eq!(stats.total_rows, 2);
        assert!(stats.by_reason.is_empty());
        assert!(stats.by_pair.is_empty());
        assert!(stats.impacted.is_empty());
        assert_eq!(
            kpi_text(&stats),
            "Total customers: 2\nTotal mismatches: 0\nMismatch rate: 0.00 percent"
        );
    }

    #[test]
    fn empty_frame_has_zero_rate() {
        let stats = compute_stats(&frame(&[])).unwrap();
        assert_eq!(stats.total_rows, 0);
        assert_eq!(stats.mismatch_rate_pct, 0.0);
    }

    #[test]
    fn kpi_text_rounds_to_two_places() {
        let stats = compute_stats(&frame(&[
            ("C1", "A", "B", "R1"),
            ("C2", "A", "A", "R0"),
            ("C3", "A", "A", "R0"),
        ]))
        .unwrap();
        assert_eq!(
            kpi_text(&stats),
            "Total customers: 3\nTotal mismatches: 1\nMismatch rate: 33.33 percent"
        );
    }
}
