use crate::structures::{
    ImpactedPattern, MigrationRecord, PatternCount, ProductPairCount, ReasonCount,
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const IMPACTED_CUSTOMERS_CSV: &str = "impacted_customers.csv";
pub const IMPACTED_BY_PATTERN_CSV: &str = "impacted_customers_by_pattern.csv";
pub const BY_REASON_CSV: &str = "mismatches_by_reason.csv";
pub const BY_PAIR_CSV: &str = "mismatches_by_pair.csv";
pub const REASON_CHART_SVG: &str = "mismatches_by_reason.svg";
pub const AI_ANALYSIS_TXT: &str = "ai_mismatch_analysis.txt";
pub const SUMMARY_JSON: &str = "mismatch_summary.json";
pub const REPORT_MD: &str = "mismatch_report.md";

fn csv_writer<W: Write>(out: &mut W) -> csv::Writer<&mut W> {
    csv::WriterBuilder::new().has_headers(false).from_writer(out)
}

pub fn write_records_csv<W: Write>(out: &mut W, records: &[MigrationRecord]) -> Result<()> {
    let mut w = csv_writer(out);
    w.write_record(["customer_id", "legacy_product", "migrated_product", "si_reason_code"])?;
    for r in records {
        w.write_record([
            &r.customer_id,
            &r.legacy_product,
            &r.migrated_product,
            &r.si_reason_code,
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// `customer_ids` is written as a JSON array so ids containing commas survive.
pub fn write_impacted_csv<W: Write>(out: &mut W, impacted: &[ImpactedPattern]) -> Result<()> {
    let mut w = csv_writer(out);
    w.write_record(["legacy_product", "migrated_product", "si_reason_code", "customer_ids"])?;
    for p in impacted {
        let ids = serde_json::to_string(&p.customer_ids)?;
        w.write_record([
            p.legacy_product.as_str(),
            p.migrated_product.as_str(),
            p.si_reason_code.as_str(),
            ids.as_str(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_reason_csv<W: Write>(out: &mut W, by_reason: &[ReasonCount]) -> Result<()> {
    let mut w = csv_writer(out);
    w.write_record(["si_reason_code", "count"])?;
    for r in by_reason {
        w.write_record([r.si_reason_code.clone(), r.count.to_string()])?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_pair_csv<W: Write>(out: &mut W, by_pair: &[ProductPairCount]) -> Result<()> {
    let mut w = csv_writer(out);
    w.write_record(["legacy_product", "migrated_product", "count"])?;
    for p in by_pair {
        w.write_record([
            p.legacy_product.clone(),
            p.migrated_product.clone(),
            p.count.to_string(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_pattern_csv<W: Write>(out: &mut W, patterns: &[PatternCount]) -> Result<()> {
    let mut w = csv_writer(out);
    w.write_record(["legacy_product", "migrated_product", "si_reason_code", "count"])?;
    for p in patterns {
        w.write_record([
            p.legacy_product.clone(),
            p.migrated_product.clone(),
            p.si_reason_code.clone(),
            p.count.to_string(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Renders a table through one of the `write_*_csv` functions into a string.
pub fn csv_text<T: ?Sized>(rows: &T, write: fn(&mut Vec<u8>, &T) -> Result<()>) -> Result<String> {
    let mut buf = Vec::new();
    write(&mut buf, rows)?;
    Ok(String::from_utf8(buf)?)
}

/// Writes report artifacts into one output directory.
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    fn create(&self, name: &str) -> Result<BufWriter<File>> {
        let path = self.path(name);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {:?}", path))?;
        Ok(BufWriter::new(file))
    }

    pub fn write_table<T: ?Sized>(
        &self,
        name: &str,
        rows: &T,
        write: fn(&mut BufWriter<File>, &T) -> Result<()>,
    ) -> Result<PathBuf> {
        let mut out = self.create(name)?;
        write(&mut out, rows).with_context(|| format!("Failed to write {}", name))?;
        out.flush()?;
        let path = self.path(name);
        info!(path = ?path, "saved table");
        Ok(path)
    }

    pub fn write_text(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write output file: {:?}", path))?;
        info!(path = ?path, "saved file");
        Ok(path)
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let out = self.create(name)?;
        serde_json::to_writer_pretty(out, value)
            .with_context(|| format!("Failed to write {}", name))?;
        let path = self.path(name);
        info!(path = ?path, "saved file");
        Ok(path)
    }
}
