//! `opnsync apply`: plan, confirm, mutate, reload.

use opnsync_core::RunReport;

use crate::cli::{GlobalOpts, ManifestArgs, OutputFormat};
use crate::error::CliError;
use crate::output::{self, Tone, paint, should_color};

use super::{plan, util};

pub async fn handle(args: ManifestArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (ctx, batches) = util::prepare_run(&args, global)?;
    let mut report = ctx.plan(&batches).await;
    util::print_warnings(&report.warnings, global);

    let color = should_color(&global.color);
    let total = report.change_count();

    if total == 0 {
        if !global.quiet {
            eprintln!("No changes. Devices match the manifest.");
        }
        return plan::skipped_as_error(&report);
    }

    if matches!(global.output, OutputFormat::Table) {
        output::print_output(&plan::render_plan(&report, color), global.quiet);
    }

    let noun = if total == 1 { "change" } else { "changes" };
    if !util::confirm(&format!("Apply {total} {noun}?"), global.yes)? {
        if !global.quiet {
            eprintln!("Aborted.");
        }
        return Ok(());
    }

    ctx.apply(&mut report).await;

    let out = output::render_single(
        &global.output,
        &report,
        |r| render_result(r, color),
        plain_results,
    )?;
    output::print_output(&out, global.quiet);

    let failed_reloads = report.reloads.iter().filter(|r| !r.is_success()).count();
    let failed = report.failures.len() + failed_reloads + report.warnings.len();
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::PartialFailure {
            failed,
            total: total + report.reloads.len() + report.warnings.len(),
        })
    }
}

// ── Rendering ───────────────────────────────────────────────────────

fn render_result(report: &RunReport, color: bool) -> String {
    let mut lines = Vec::new();

    for f in &report.failures {
        lines.push(paint(
            &format!("✗ {} {} {}@{}: {}", f.action, f.kind, f.name, f.device, f.error),
            Tone::Remove,
            color,
        ));
    }

    for r in &report.reloads {
        let line = match &r.error {
            None => paint(&format!("✓ reloaded {} on {}", r.domain, r.device), Tone::Add, color),
            Some(e) => paint(
                &format!("✗ reload of {} on {} failed: {e}", r.domain, r.device),
                Tone::Remove,
                color,
            ),
        };
        lines.push(line);
    }

    lines.push(format!(
        "Applied {} of {} changes.",
        report.applied,
        report.change_count()
    ));
    lines.join("\n")
}

/// `ok`/`failed` per change and reload, tab-separated.
fn plain_results(report: &RunReport) -> String {
    let failures = report
        .failures
        .iter()
        .map(|f| format!("failed\t{}\t{}\t{}@{}", f.action, f.kind, f.name, f.device));
    let reloads = report.reloads.iter().map(|r| {
        let status = if r.is_success() { "ok" } else { "failed" };
        format!("{status}\treload\t{}\t{}", r.domain, r.device)
    });
    failures.chain(reloads).collect::<Vec<_>>().join("\n")
}
