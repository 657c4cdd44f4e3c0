use crate::analysis::kpi_text;
use crate::structures::{MismatchStats, PatternCount, ProductPairCount, ReasonCount};
use chrono::Utc;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct MismatchSummary {
    pub generated_at: String,
    pub input: String,
    pub total_rows: usize,
    pub total_mismatches: usize,
    pub mismatch_rate_pct: f64,
    pub by_reason: Vec<ReasonCount>,
    pub by_pair: Vec<ProductPairCount>,
    pub patterns: Vec<PatternCount>,
    /// false when the narrative is the fixed no-mismatch text or a fallback.
    pub ai_analysis_generated: bool,
}

impl MismatchSummary {
    pub fn new(input: &Path, stats: &MismatchStats, ai_analysis_generated: bool) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339(),
            input: input.display().to_string(),
            total_rows: stats.total_rows,
            total_mismatches: stats.total_mismatches,
            mismatch_rate_pct: stats.mismatch_rate_pct,
            by_reason: stats.by_reason.clone(),
            by_pair: stats.by_pair.clone(),
            patterns: stats.patterns.clone(),
            ai_analysis_generated,
        }
    }
}

fn md_cell(s: &str) -> String {
    if s.is_empty() {
        "(blank)".to_string()
    } else {
        s.replace('|', "\\|")
    }
}

/// Markdown dashboard: key metrics, reason view, product view, narrative, artifacts.
pub fn render_markdown(
    summary: &MismatchSummary,
    stats: &MismatchStats,
    ai_text: &str,
    artifacts: &[(&str, &Path)],
) -> String {
    let mut md = String::new();

    md.push_str("# Migration mismatch dashboard\n\n");
    md.push_str(&format!("Generated: {}\n\n", summary.generated_at));
    md.push_str(&format!("Input: {}\n\n", summary.input));

    md.push_str("## Key metrics\n\n```text\n");
    md.push_str(&kpi_text(stats));
    md.push_str("\n```\n\n");

    md.push_str("## Reason view\n\n");
    if stats.by_reason.is_empty() {
        md.push_str("No mismatches detected.\n\n");
    } else {
        md.push_str("| SI reason code | Count |\n|---|---:|\n");
        for r in &stats.by_reason {
            md.push_str(&format!("| {} | {} |\n", md_cell(&r.si_reason_code), r.count));
        }
        md.push('\n');
    }

    md.push_str("## Product view\n\n");
    if stats.by_pair.is_empty() {
        md.push_str("No mismatches detected.\n\n");
    } else {
        md.push_str("| Legacy product | Migrated product | Count |\n|---|---|---:|\n");
        for p in &stats.by_pair {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                md_cell(&p.legacy_product),
                md_cell(&p.migrated_product),
                p.count
            ));
        }
        md.push('\n');
    }

    md.push_str("## AI analysis\n\n");
    // narrative carries its own level-2 headings
    md.push_str(ai_text.trim_end());
    md.push_str("\n\n");

    md.push_str("## Artifacts\n\n");
    for (name, path) in artifacts {
        md.push_str(&format!("- {}: {}\n", name, path.display()));
    }

    md
}
