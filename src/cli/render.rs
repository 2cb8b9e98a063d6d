//! Human-readable report output

use colored::{ColoredString, Colorize};

use crate::engine::ResultEvaluator;
use crate::model::{ScoreTier, TestSuiteReport, UnitStatus};

pub fn print_report(report: &TestSuiteReport, evaluator: &ResultEvaluator) {
    let stats = &report.statistics;

    println!(
        "\n{} {} {}",
        "Suite:".blue().bold(),
        report.suite_name.white().bold(),
        format!("({})", report.suite_id).dimmed()
    );
    println!("  Product: {} ({})", report.product_name, report.product_id);

    for result in evaluator.suite_results(&report.suite_id) {
        let passed = evaluator.is_successful(result);
        let marker = if passed { "✓".green() } else { "✗".red() };
        let outcome = match (result.status(), result.match_score()) {
            (UnitStatus::Completed, Some(score)) => {
                format!("{:.2} {}", score, tier_label(ScoreTier::from_score(score)))
            }
            (status, _) => status.to_string().yellow().to_string(),
        };
        println!(
            "  {} {:<18} {} {}",
            marker,
            result.mode.to_string(),
            result.unit_id.dimmed(),
            outcome
        );
        if let Some(err) = result.error_message() {
            println!("      {}", err.red());
        } else if !result.missing_action_ids().is_empty() {
            println!("      missing: {}", result.missing_action_ids().join(", ").dimmed());
        }
    }

    let headline = format!(
        "Passed {}/{} ({:.1}%)",
        stats.passed_units,
        stats.total_units,
        stats.pass_rate * 100.0
    );
    let headline = if stats.failed_units == 0 {
        headline.green().bold()
    } else {
        headline.red().bold()
    };
    println!("\n  {}", headline);

    match (stats.average_score, stats.min_score, stats.max_score) {
        (Some(avg), Some(min), Some(max)) => println!(
            "  Scores: avg {:.2}, min {:.2}, max {:.2}{}",
            avg,
            min,
            max,
            stats
                .overall_tier
                .map(|t| format!(" [{}]", tier_label(t)))
                .unwrap_or_default()
        ),
        _ => println!("  Scores: none"),
    }
    println!(
        "  Exact matches: {}  Timed out: {}  Failed: {}  Interrupted: {}",
        stats.exact_matches, stats.timed_out_units, stats.errored_units, stats.interrupted_units
    );

    let d = &stats.distribution;
    println!(
        "  Distribution: perfect {} | high {} | medium {} | low {} | very low {} | no score {}",
        d.perfect, d.high, d.medium, d.low, d.very_low, d.no_score
    );
    for (mode, m) in &stats.modes {
        println!(
            "  {:<18} {}/{} passed{}",
            mode.to_string(),
            m.passed,
            m.total,
            m.average_score
                .map(|a| format!(", avg {:.2}", a))
                .unwrap_or_default()
        );
    }
    if let Some(ms) = report.total_duration_ms {
        println!("  Duration: {:.1}s", ms as f64 / 1000.0);
    }
}

fn tier_label(tier: ScoreTier) -> ColoredString {
    match tier {
        ScoreTier::Excellent => tier.description().green(),
        ScoreTier::Good => tier.description().green(),
        ScoreTier::Acceptable => tier.description().yellow(),
        ScoreTier::Poor => tier.description().yellow(),
        ScoreTier::Failed => tier.description().red(),
    }
}
