pub mod stats;

use crate::analysis::report::{render_markdown, MismatchSummary};
use crate::analysis::{compute_stats, kpi_text};
use crate::chart::{looks_like_svg, render_empty_chart, render_reason_chart};
use crate::cli::ReportArgs;
use crate::llm::{narrate_or_fallback, narrator_from_config, Narrator, NO_MISMATCH_ANALYSIS};
use crate::loader::load_migration_frame;
use crate::structures::MismatchStats;
use crate::writer::{
    write_impacted_csv, write_pair_csv, write_reason_csv, write_records_csv, ReportWriter,
    AI_ANALYSIS_TXT, BY_PAIR_CSV, BY_REASON_CSV, IMPACTED_BY_PATTERN_CSV, IMPACTED_CUSTOMERS_CSV,
    REASON_CHART_SVG, REPORT_MD, SUMMARY_JSON,
};
use anyhow::{anyhow, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument};

pub struct ReportOutcome {
    pub stats: MismatchStats,
    pub ai_text: String,
    pub ai_analysis_generated: bool,
    pub output_dir: PathBuf,
}

/// Loads the migration file, aggregates it and writes every artifact.
#[instrument(skip(narrator))]
pub fn generate_report(
    input: &Path,
    output_dir: &Path,
    narrator: &dyn Narrator,
) -> Result<ReportOutcome> {
    let t_load = Instant::now();
    let df = load_migration_frame(input)?;
    let stats = compute_stats(&df)?;
    info!(
        duration_s = t_load.elapsed().as_secs_f32(),
        "stats computed"
    );

    let writer = ReportWriter::new(output_dir)?;
    let mut artifacts: Vec<(&str, PathBuf)> = Vec::new();

    artifacts.push((
        IMPACTED_CUSTOMERS_CSV,
        writer.write_table(IMPACTED_CUSTOMERS_CSV, stats.mismatches.as_slice(), write_records_csv)?,
    ));
    artifacts.push((
        IMPACTED_BY_PATTERN_CSV,
        writer.write_table(IMPACTED_BY_PATTERN_CSV, stats.impacted.as_slice(), write_impacted_csv)?,
    ));
    artifacts.push((
        BY_REASON_CSV,
        writer.write_table(BY_REASON_CSV, stats.by_reason.as_slice(), write_reason_csv)?,
    ));
    artifacts.push((
        BY_PAIR_CSV,
        writer.write_table(BY_PAIR_CSV, stats.by_pair.as_slice(), write_pair_csv)?,
    ));

    let (svg, ai_text, ai_analysis_generated) = if stats.has_mismatches() {
        let t_ai = Instant::now();
        let (text, generated) = narrate_or_fallback(narrator, &stats.patterns, &stats.impacted);
        info!(
            generated,
            duration_s = t_ai.elapsed().as_secs_f32(),
            "AI analysis step finished"
        );
        (render_reason_chart(&stats.by_reason)?, text, generated)
    } else {
        info!("no mismatches; skipping AI analysis");
        (render_empty_chart()?, NO_MISMATCH_ANALYSIS.to_string(), false)
    };

    if !looks_like_svg(&svg) {
        return Err(anyhow!("Rendered chart is not a valid SVG document"));
    }
    artifacts.push((REASON_CHART_SVG, writer.write_text(REASON_CHART_SVG, &svg)?));
    artifacts.push((AI_ANALYSIS_TXT, writer.write_text(AI_ANALYSIS_TXT, &ai_text)?));

    let summary = MismatchSummary::new(input, &stats, ai_analysis_generated);
    artifacts.push((SUMMARY_JSON, writer.write_json(SUMMARY_JSON, &summary)?));

    let md_path = writer.path(REPORT_MD);
    artifacts.push((REPORT_MD, md_path));
    let listed: Vec<(&str, &Path)> = artifacts.iter().map(|(n, p)| (*n, p.as_path())).collect();
    let md = render_markdown(&summary, &stats, &ai_text, &listed);
    writer.write_text(REPORT_MD, &md)?;

    info!(
        output_dir = ?writer.output_dir(),
        artifacts = artifacts.len(),
        "report written"
    );

    Ok(ReportOutcome {
        stats,
        ai_text,
        ai_analysis_generated,
        output_dir: writer.output_dir().to_path_buf(),
    })
}

/// Process exit code for a finished report: 2 when mismatches were found and
/// the run asked to fail on them, 0 otherwise.
pub fn exit_code(outcome: &ReportOutcome, fail_on_mismatch: bool) -> i32 {
    if fail_on_mismatch && outcome.stats.has_mismatches() {
        2
    } else {
        0
    }
}

pub fn run_report(args: ReportArgs) -> Result<ReportOutcome> {
    info!(input = ?args.input, output_dir = ?args.output_dir, "starting report");
    let narrator = narrator_from_config(&args.llm_config(), args.no_llm)?;
    let outcome = generate_report(&args.input, &args.output_dir, narrator.as_ref())?;

    println!("{}", kpi_text(&outcome.stats));
    stats::print_tables(&outcome.stats);
    println!();
    println!("{}", outcome.ai_text);
    println!();
    let ai_status = if outcome.ai_analysis_generated {
        "AI analysis generated".green()
    } else {
        "AI analysis unavailable, fallback text written".yellow()
    };
    println!("{}", ai_status);
    println!("Saved report to {}", outcome.output_dir.display());

    Ok(outcome)
}
