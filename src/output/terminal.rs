//! Terminal output formatting with colors and box drawing.

use colored::Colorize;

use super::Report;
use crate::analysis::{HourlyPrediction, ParameterSummary};
use crate::error::FitWarning;

/// Format a report for human-readable terminal output.
///
/// Uses ANSI colors and Unicode box drawing. The header shows a checkmark
/// when every parameter converged and a warning symbol otherwise.
pub fn format_report(report: &Report) -> String {
    let mut output = String::new();
    let diagnostics = &report.diagnostics;

    let header = if diagnostics.warnings.is_empty() {
        format!("{} {}", "\u{2713}".green().bold(), "CONVERGED".green().bold())
    } else {
        format!(
            "{} {}",
            "\u{26A0}".yellow().bold(),
            "CHECK DIAGNOSTICS".yellow().bold()
        )
    };

    output.push_str(&format_box_top());
    output.push_str(&format_box_line(&header));
    output.push_str(&format_box_line(&report.formula));
    output.push_str(&format_box_line(&format!(
        "{} rows, {} chains x {} draws",
        report.n_observations, report.chains, report.iterations
    )));
    output.push_str(&format_box_separator());

    // Parameter table
    let level = report.summary.first().map(|s| s.level).unwrap_or(0.95);
    output.push_str(&format_box_line(
        &format!(
            "{:<18} {:>8} {:>7} {:>17} {:>6}",
            "Parameter",
            "Mean",
            "SD",
            format!("{:.0}% CI", level * 100.0),
            "R-hat"
        )
        .bold()
        .to_string(),
    ));
    for summary in &report.summary {
        let rhat = diagnostics
            .rhat
            .get(&summary.name)
            .copied()
            .unwrap_or(f64::NAN);
        output.push_str(&format_box_line(&format_summary_row(
            summary,
            rhat,
            diagnostics.threshold,
        )));
    }

    if let Some(gof) = &report.goodness_of_fit {
        output.push_str(&format_box_separator());
        output.push_str(&format_box_line(&"Goodness of fit (in-sample):".bold().to_string()));
        output.push_str(&format_box_line(&format!(
            "  R\u{00B2} = {:.3}   RMSE = {:.2} min   n = {}",
            gof.r2, gof.rmse, gof.n
        )));
    }

    if !report.hourly.is_empty() {
        output.push_str(&format_box_separator());
        output.push_str(&format_hourly(&report.hourly));
    }

    output.push_str(&format_box_separator());
    output.push_str(&format_box_line(&format!(
        "Divergences: {}   min ESS: {:.0}",
        diagnostics.divergences,
        diagnostics.min_ess()
    )));

    if !diagnostics.warnings.is_empty() {
        output.push_str(&format_box_separator());
        for warning in &diagnostics.warnings {
            output.push_str(&format_box_line(&format_warning(warning)));
        }
    }

    output.push_str(&format_box_bottom());
    output
}

fn format_summary_row(summary: &ParameterSummary, rhat: f64, threshold: f64) -> String {
    let rhat_str = format!("{:>6.3}", rhat);
    let rhat_colored = if !rhat.is_finite() || rhat > threshold {
        rhat_str.red().to_string()
    } else {
        rhat_str.green().to_string()
    };
    format!(
        "{:<18} {:>8.2} {:>7.2} {:>17} {}",
        truncate(&summary.name, 18),
        summary.mean,
        summary.sd,
        format!("[{:.2}, {:.2}]", summary.lower, summary.upper),
        rhat_colored
    )
}

/// One row per hour, one column per mode.
fn format_hourly(hourly: &[HourlyPrediction]) -> String {
    let mut modes: Vec<&str> = Vec::new();
    let mut hours: Vec<u8> = Vec::new();
    for h in hourly {
        if !modes.contains(&h.mode.as_str()) {
            modes.push(&h.mode);
        }
        if !hours.contains(&h.hour) {
            hours.push(h.hour);
        }
    }
    hours.sort_unstable();

    let mut output = String::new();
    let mut header = format!("{:<6}", "Hour");
    for mode in &modes {
        header.push_str(&format!(" {:>10}", truncate(mode, 10)));
    }
    output.push_str(&format_box_line(&header.bold().to_string()));

    for hour in hours {
        let mut line = format!("{:02}:00 ", hour);
        for mode in &modes {
            let value = hourly
                .iter()
                .find(|h| h.hour == hour && h.mode == *mode)
                .map(|h| format!("{:.1}", h.predicted))
                .unwrap_or_else(|| "-".to_string());
            line.push_str(&format!(" {:>10}", value));
        }
        output.push_str(&format_box_line(&line));
    }
    output
}

fn format_warning(warning: &FitWarning) -> String {
    let label = match warning {
        FitWarning::SamplerDivergence { .. } => "Divergence",
        FitWarning::NonConvergence { .. } => "Non-convergence",
    };
    format!("{}: {}", label.yellow().bold(), warning.describe())
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width - 1).collect();
        out.push('\u{2026}');
        out
    }
}

// Box drawing helpers

const BOX_WIDTH: usize = 66;

fn format_box_top() -> String {
    format!("\u{250C}{}\u{2510}\n", "\u{2500}".repeat(BOX_WIDTH))
}

fn format_box_bottom() -> String {
    format!("\u{2514}{}\u{2518}\n", "\u{2500}".repeat(BOX_WIDTH))
}

fn format_box_separator() -> String {
    format!("\u{251C}{}\u{2524}\n", "\u{2500}".repeat(BOX_WIDTH))
}

fn format_box_line(content: &str) -> String {
    // Strip ANSI codes for length calculation
    let visible_len = strip_ansi_codes(content).chars().count();
    let padding = (BOX_WIDTH - 2).saturating_sub(visible_len);
    format!("\u{2502} {}{} \u{2502}\n", content, " ".repeat(padding))
}

/// Strip ANSI escape codes for accurate length calculation.
fn strip_ansi_codes(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // Skip until 'm' (end of ANSI sequence)
            while let Some(&next) = chars.peek() {
                chars.next();
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
