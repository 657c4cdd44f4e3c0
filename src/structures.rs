use serde::Serialize;
use std::fmt::{self, Display};

/// One row of the migration file: a customer and the product it moved from/to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    pub customer_id: String,
    pub legacy_product: String,
    pub migrated_product: String,
    pub si_reason_code: String,
}

impl MigrationRecord {
    pub fn new(
        customer_id: impl Into<String>,
        legacy_product: impl Into<String>,
        migrated_product: impl Into<String>,
        si_reason_code: impl Into<String>,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            legacy_product: legacy_product.into(),
            migrated_product: migrated_product.into(),
            si_reason_code: si_reason_code.into(),
        }
    }

    pub fn is_mismatch(&self) -> bool {
        self.legacy_product != self.migrated_product
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasonCount {
    pub si_reason_code: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductPairCount {
    pub legacy_product: String,
    pub migrated_product: String,
    pub count: u64,
}

/// Mismatch count for a (legacy, migrated, reason) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternCount {
    pub legacy_product: String,
    pub migrated_product: String,
    pub si_reason_code: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactedPattern {
    pub legacy_product: String,
    pub migrated_product: String,
    pub si_reason_code: String,
    pub customer_ids: Vec<String>,
}

impl Display for PatternCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} [{}]",
            self.legacy_product, self.migrated_product, self.si_reason_code
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct MismatchStats {
    pub total_rows: usize,
    pub total_mismatches: usize,
    pub mismatch_rate_pct: f64,
    /// Mismatch rows in input order.
    pub mismatches: Vec<MigrationRecord>,
    pub by_reason: Vec<ReasonCount>,
    pub by_pair: Vec<ProductPairCount>,
    pub patterns: Vec<PatternCount>,
    pub impacted: Vec<ImpactedPattern>,
}

impl MismatchStats {
    /// Stats for a file in which every row kept its product.
    pub fn without_mismatches(total_rows: usize) -> Self {
        Self {
            total_rows,
            ..Self::default()
        }
    }

    pub fn has_mismatches(&self) -> bool {
        self.total_mismatches > 0
    }
}
