use crate::analysis::report::MismatchSummary;
use crate::analysis::{compute_stats, kpi_text};
use crate::cli::StatsArgs;
use crate::loader::load_migration_frame;
use crate::structures::MismatchStats;
use anyhow::Result;
use colored::Colorize;
use std::path::Path;

fn display_cell(s: &str) -> &str {
    if s.is_empty() {
        "(blank)"
    } else {
        s
    }
}

/// Prints the reason view and the product view to stdout.
pub fn print_tables(stats: &MismatchStats) {
    println!();
    println!("{}", "Mismatches by SI reason code".bold());
    if stats.by_reason.is_empty() {
        println!("  {}", "No mismatches detected".green());
    }
    for r in &stats.by_reason {
        println!("  {:<24} {:>8}", display_cell(&r.si_reason_code), r.count);
    }

    println!();
    println!("{}", "Mismatches by product pair".bold());
    if stats.by_pair.is_empty() {
        println!("  {}", "No mismatches detected".green());
    }
    for p in &stats.by_pair {
        let pair = format!(
            "{} -> {}",
            display_cell(&p.legacy_product),
            display_cell(&p.migrated_product)
        );
        println!("  {:<40} {:>8}", pair, p.count);
    }
}

/// The `--json` form of the stats output. The model is never called here.
pub fn summary_json(input: &Path, stats: &MismatchStats) -> Result<String> {
    let summary = MismatchSummary::new(input, stats, false);
    Ok(serde_json::to_string_pretty(&summary)?)
}

/// Read-only: prints to stdout and writes no files.
pub fn run_stats(args: StatsArgs) -> Result<MismatchStats> {
    let df = load_migration_frame(&args.input)?;
    let stats = compute_stats(&df)?;

    if args.json {
        println!("{}", summary_json(&args.input, &stats)?);
        return Ok(stats);
    }

    let kpi = kpi_text(&stats);
    if stats.has_mismatches() {
        println!("{}", kpi.yellow());
    } else {
        println!("{}", kpi.green());
    }
    print_tables(&stats);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    const INPUT: &str = "customer_id,legacy_product,migrated_product,si_reason_code\n\
                         C1,GAS_STD,GAS_STD,R0\n\
                         C2,ELEC_FIX,ELEC_VAR,R2\n";

    #[test]
    fn json_summary_carries_the_kpis() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("migration.csv");
        std::fs::File::create(&input).unwrap().write_all(INPUT.as_bytes()).unwrap();

        let stats = run_stats(StatsArgs {
            input: input.clone(),
            json: true,
        })
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&summary_json(&input, &stats).unwrap()).unwrap();
        assert_eq!(json["total_rows"], 2);
        assert_eq!(json["total_mismatches"], 1);
        assert_eq!(json["mismatch_rate_pct"], 50.0);
        assert_eq!(json["ai_analysis_generated"], false);
        assert_eq!(json["by_reason"][0]["si_reason_code"], "R2");
    }

    #[test]
    fn stats_writes_no_files() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("migration.csv");
        std::fs::File::create(&input).unwrap().write_all(INPUT.as_bytes()).unwrap();

        for json in [true, false] {
            run_stats(StatsArgs {
                input: input.clone(),
                json,
            })
            .unwrap();
        }

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("migration.csv")]);
    }
}
