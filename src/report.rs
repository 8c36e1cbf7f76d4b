//! Human-readable and JSON rendering of a run summary.
//!
//! Reports go to stdout; logs go to stderr.

use std::fmt::Write as _;

use crate::reconcile::{ConsistencyReport, RunSummary};

/// Output format for the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Render the summary in the requested format.
pub fn render(summary: &RunSummary, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(render_text(summary)),
        ReportFormat::Json => serde_json::to_string_pretty(summary),
    }
}

fn render_check(out: &mut String, title: &str, summary: &RunSummary, report: &ConsistencyReport) {
    let _ = writeln!(out, "== {} ==", title);
    for peer in &summary.peers {
        if !report.was_checked(&peer.name) {
            let _ = writeln!(out, "  [skip] {} (not compared)", peer);
            continue;
        }
        let findings: Vec<_> = report.for_peer(&peer.name).collect();
        if findings.is_empty() {
            let _ = writeln!(out, "  [ok]   {}", peer);
        } else {
            let _ = writeln!(out, "  [FAIL] {}", peer);
            for d in findings {
                let _ = writeln!(out, "         {}", d);
            }
        }
    }
}

/// Plain-text report: one block per phase, one line per peer, then a banner.
pub fn render_text(summary: &RunSummary) -> String {
    let mut out = String::new();

    render_check(&mut out, "Initial check", summary, &summary.initial);

    if !summary.repairs.is_empty() {
        let title = if summary.dry_run {
            "Repair (dry run)"
        } else {
            "Repair"
        };
        let _ = writeln!(out, "== {} ==", title);
        for repair in &summary.repairs {
            match &repair.skipped {
                Some(reason) => {
                    let _ = writeln!(out, "  [skip] {}: {}", repair.peer_name, reason);
                }
                None => {
                    let _ = writeln!(
                        out,
                        "  {}: forgot {}, met {}, failed {}",
                        repair.peer_name,
                        repair.forgotten_count,
                        repair.introduced_count,
                        repair.failed_commands()
                    );
                    for failure in &repair.failures {
                        let _ = writeln!(out, "         {}", failure);
                    }
                }
            }
        }
    }

    if let Some(convergence) = &summary.convergence {
        let _ = writeln!(out, "== Convergence ==");
        let counts = convergence
            .last_counts
            .map(|c| format!("{} connected, {} failing", c.connected, c.failing))
            .unwrap_or_else(|| "no successful poll".to_string());
        let _ = writeln!(
            out,
            "  {} after {}s ({} polls, expected {}; {})",
            if convergence.converged {
                "converged"
            } else {
                "timed out"
            },
            convergence.elapsed_seconds(),
            convergence.polls,
            convergence.expected,
            counts
        );
    }

    if let Some(final_report) = &summary.final_report {
        render_check(&mut out, "Final check", summary, final_report);
    }

    let banner = if summary.outcome.is_success() {
        "PASS"
    } else {
        "FAIL"
    };
    let _ = writeln!(out, "{}: cluster {}", banner, summary.outcome);

    out
}
