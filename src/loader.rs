use crate::error::InputError;
use crate::structures::MigrationRecord;
use anyhow::{Context, Result};
use polars::lazy::dsl::{col, lit};
use polars::prelude::*;
use std::path::Path;
use tracing::{info, instrument};

pub const CUSTOMER_ID: &str = "customer_id";
pub const LEGACY_PRODUCT: &str = "legacy_product";
pub const MIGRATED_PRODUCT: &str = "migrated_product";
pub const SI_REASON_CODE: &str = "si_reason_code";

pub const REQUIRED_COLUMNS: [&str; 4] = [CUSTOMER_ID, LEGACY_PRODUCT, MIGRATED_PRODUCT, SI_REASON_CODE];

/// Reads the migration CSV into a frame holding exactly the four required
/// columns, all as text with empty cells turned into "".
#[instrument]
pub fn load_migration_frame(path: &Path) -> Result<DataFrame> {
    // infer_schema_length = 0 keeps every column as String (ids like "007" survive)
    let raw = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("Failed to open migration file: {:?}", path))?
        .finish()
        .with_context(|| format!("Failed reading migration CSV: {:?}", path))?;

    let df = normalize_frame(raw)?;
    info!(rows = df.height(), path = ?path, "loaded migration file");
    Ok(df)
}

/// Checks the required columns and projects the frame onto them.
///
/// Rows where all four required cells are null (blank lines in the file) are
/// dropped. Remaining nulls become "", so a row with both products blank
/// compares equal and is not a mismatch.
pub fn normalize_frame(raw: DataFrame) -> Result<DataFrame> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| raw.get_column_index(c).is_none())
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(InputError::MissingColumns(missing).into());
    }

    let projection: Vec<Expr> = REQUIRED_COLUMNS
        .iter()
        .map(|c| col(*c).cast(DataType::String).fill_null(lit("")).alias(*c))
        .collect();

    let has_any_cell = REQUIRED_COLUMNS
        .iter()
        .map(|c| col(*c).is_not_null())
        .reduce(|a, b| a.or(b))
        .unwrap_or_else(|| lit(true));

    let df = raw
        .lazy()
        .filter(has_any_cell)
        .select(projection)
        .collect()
        .context("Failed to normalize migration columns")?;
    Ok(df)
}

fn text_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a StringChunked> {
    let column = df.column(name)?;
    column.str().map_err(|e| {
        InputError::UnreadableColumn {
            column: name.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Typed rows of a normalized frame, in frame order.
pub fn records_from_frame(df: &DataFrame) -> Result<Vec<MigrationRecord>> {
    let customer_ids = text_column(df, CUSTOMER_ID)?;
    let legacy = text_column(df, LEGACY_PRODUCT)?;
    let migrated = text_column(df, MIGRATED_PRODUCT)?;
    let reasons = text_column(df, SI_REASON_CODE)?;

    let records = (0..df.height())
        .map(|i| {
            MigrationRecord::new(
                customer_ids.get(i).unwrap_or_default(),
                legacy.get(i).unwrap_or_default(),
                migrated.get(i).unwrap_or_default(),
                reasons.get(i).unwrap_or_default(),
            )
        })
        .collect();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn loads_all_columns_as_text() {
        let f = csv_file(
            "customer_id,legacy_product,migrated_product,si_reason_code\n\
             007,GAS_STD,GAS_STD,10\n\
             008,ELEC_FIX,ELEC_VAR,20\n",
        );
        let df = load_migration_frame(f.path()).unwrap();
        assert_eq!(df.height(), 2);

        let records = records_from_frame(&df).unwrap();
        assert_eq!(records[0], MigrationRecord::new("007", "GAS_STD", "GAS_STD", "10"));
        assert_eq!(records[1].customer_id, "008");
        assert_eq!(records[1].si_reason_code, "20");
    }

    #[test]
    fn drops_extra_columns_and_fills_empty_cells() {
        let f = csv_file(
            "region,customer_id,legacy_product,migrated_product,si_reason_code\n\
             north,C1,GAS_STD,,R1\n",
        );
        let df = load_migration_frame(f.path()).unwrap();
        assert_eq!(df.width(), 4);
        assert!(df.get_column_index("region").is_none());

        let records = records_from_frame(&df).unwrap();
        assert_eq!(records[0].migrated_product, "");
    }

    #[test]
    fn reports_every_missing_column() {
        let f = csv_file("customer_id,legacy_product\nC1,GAS_STD\n");
        let err = load_migration_frame(f.path()).unwrap_err();
        match err.downcast_ref::<InputError>() {
            Some(InputError::MissingColumns(cols)) => {
                assert_eq!(cols, &vec!["migrated_product".to_string(), "si_reason_code".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn header_only_file_has_no_rows() {
        let f = csv_file("customer_id,legacy_product,migrated_product,si_reason_code\n");
        let df = load_migration_frame(f.path()).unwrap();
        assert_eq!(df.height(), 0);
        assert!(records_from_frame(&df).unwrap().is_empty());
    }

    #[test]
    fn blank_lines_are_not_rows() {
        let f = csv_file(
            "customer_id,legacy_product,migrated_product,si_reason_code\n\
             C1,A,B,R1\n\
             \n\
             C2,A,A,R0\n\
             \n\
             \n",
        );
        let df = load_migration_frame(f.path()).unwrap();
        assert_eq!(df.height(), 2);

        let records = records_from_frame(&df).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.customer_id.as_str()).collect();
        assert_eq!(ids, ["C1", "C2"]);

        let stats = crate::analysis::compute_stats(&df).unwrap();
        assert_eq!(
            crate::analysis::kpi_text(&stats),
            "Total customers: 2\nTotal mismatches: 1\nMismatch rate: 50.00 percent"
        );
    }

    #[test]
    fn blank_products_compare_equal() {
        let f = csv_file(
            "customer_id,legacy_product,migrated_product,si_reason_code\n\
             C1,,,R1\n\
             C2,,GAS_STD,R1\n",
        );
        let df = load_migration_frame(f.path()).unwrap();
        let records = records_from_frame(&df).unwrap();
        assert!(!records[0].is_mismatch());
        assert!(records[1].is_mismatch());
        assert_eq!(crate::analysis::compute_stats(&df).unwrap().total_mismatches, 1);
    }

    #[test]
    fn null_rows_are_dropped_but_partial_rows_kept() {
        let raw = df!(
            "customer_id" => [Some("C1"), None, None],
            "legacy_product" => [Some("A"), None, None],
            "migrated_product" => [Some("B"), None, Some("B")],
            "si_reason_code" => [Some("R1"), None, None]
        )
        .unwrap();
        let df = normalize_frame(raw).unwrap();
        assert_eq!(df.height(), 2);
        let records = records_from_frame(&df).unwrap();
        assert_eq!(records[1], MigrationRecord::new("", "", "B", ""));
        assert!(records[1].is_mismatch());
    }

    #[test]
    fn normalizes_non_text_columns() {
        let raw = df!(
            "customer_id" => [1i64, 2],
            "legacy_product" => ["A", "B"],
            "migrated_product" => ["A", "C"],
            "si_reason_code" => [Some("R1"), None]
        )
        .unwrap();
        let df = normalize_frame(raw).unwrap();
        let records = records_from_frame(&df).unwrap();
        assert_eq!(records[0].customer_id, "1");
        assert_eq!(records[1].si_reason_code, "");
    }
}
