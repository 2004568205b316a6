//! `opnsync plan`: dry run of a manifest.

use opnsync_core::{Action, Change, RunReport};

use crate::cli::{GlobalOpts, ManifestArgs};
use crate::error::CliError;
use crate::output::{self, Tone, paint, should_color};

use super::util;

pub async fn handle(args: ManifestArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (ctx, batches) = util::prepare_run(&args, global)?;
    let report = ctx.plan(&batches).await;
    util::print_warnings(&report.warnings, global);

    let color = should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &report,
        |r| render_plan(r, color),
        plain_changes,
    )?;
    output::print_output(&out, global.quiet);

    skipped_as_error(&report)
}

/// A plan with unreadable devices is incomplete.
pub fn skipped_as_error(report: &RunReport) -> Result<(), CliError> {
    if report.warnings.is_empty() {
        Ok(())
    } else {
        Err(CliError::PartialFailure {
            failed: report.warnings.len(),
            total: report.warnings.len() + report.change_count(),
        })
    }
}

// ── Rendering ───────────────────────────────────────────────────────

fn symbol(action: Action) -> (&'static str, Tone) {
    match action {
        Action::Create => ("+", Tone::Add),
        Action::Update => ("~", Tone::Change),
        Action::Delete => ("-", Tone::Remove),
    }
}

fn render_change(change: &Change, color: bool) -> Vec<String> {
    let (sym, tone) = symbol(change.action);
    let mut lines = vec![paint(
        &format!("{sym} {} {}", change.kind, change.key()),
        tone,
        color,
    )];

    for field in &change.fields {
        let line = match (change.action, field.from.as_deref()) {
            (Action::Update, Some(from)) => format!("    {}: {from:?} -> {:?}", field.path, field.to),
            (Action::Update, None) => format!("    {}: (unset) -> {:?}", field.path, field.to),
            _ => format!("    {}: {:?}", field.path, field.to),
        };
        lines.push(line);
    }
    lines
}

/// Human-readable plan: one `+`/`~`/`-` block per change and a summary.
pub fn render_plan(report: &RunReport, color: bool) -> String {
    let mut lines = Vec::new();
    for plan in &report.plans {
        for change in &plan.changes {
            lines.extend(render_change(change, color));
        }
        for key in &plan.skipped {
            lines.push(paint(
                &format!("! {} {key} (skipped: device could not be read)", plan.kind),
                Tone::Muted,
                color,
            ));
        }
    }

    let count = |action: Action| {
        report
            .plans
            .iter()
            .flat_map(|p| &p.changes)
            .filter(|c| c.action == action)
            .count()
    };

    if report.change_count() == 0 {
        lines.push("No changes. Devices match the manifest.".to_owned());
    } else {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(format!(
            "Plan: {} to create, {} to update, {} to delete.",
            count(Action::Create),
            count(Action::Update),
            count(Action::Delete)
        ));
    }
    lines.join("\n")
}

/// One `action kind name@device` line per change.
pub fn plain_changes(report: &RunReport) -> String {
    report
        .plans
        .iter()
        .flat_map(|p| &p.changes)
        .map(|c| format!("{} {} {}", c.action, c.kind, c.key()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use opnsync_core::{AttrMap, FieldChange, Plan, RunMode};

    fn change(action: Action, name: &str, fields: Vec<FieldChange>) -> Change {
        Change {
            kind: "haproxy_acl",
            action,
            device: "fw01".into(),
            name: name.into(),
            identifier: String::new(),
            attrs: AttrMap::new(),
            fields,
        }
    }

    fn report(changes: Vec<Change>) -> RunReport {
        RunReport {
            mode: RunMode::DryRun,
            discovered: 0,
            plans: vec![Plan {
                kind: "haproxy_acl",
                changes,
                skipped: vec!["late@fw02".into()],
            }],
            warnings: Vec::new(),
            applied: 0,
            failures: Vec::new(),
            reloads: Vec::new(),
        }
    }

    #[test]
    fn plan_lists_changes_with_symbols_and_summary() {
        let r = report(vec![
            change(
                Action::Create,
                "fresh",
                vec![FieldChange {
                    path: "expression".into(),
                    from: None,
                    to: "src".into(),
                }],
            ),
            change(
                Action::Update,
                "changed",
                vec![FieldChange {
                    path: "expression".into(),
                    from: Some("hdr_beg".into()),
                    to: "path_beg".into(),
                }],
            ),
            change(Action::Delete, "stray", Vec::new()),
        ]);

        let text = render_plan(&r, false);
        assert!(text.contains("+ haproxy_acl fresh@fw01\n    expression: \"src\""));
        assert!(text.contains("~ haproxy_acl changed@fw01\n    expression: \"hdr_beg\" -> \"path_beg\""));
        assert!(text.contains("- haproxy_acl stray@fw01"));
        assert!(text.contains("! haproxy_acl late@fw02"));
        assert!(text.ends_with("Plan: 1 to create, 1 to update, 1 to delete."));
    }

    #[test]
    fn empty_plan_says_so() {
        let text = render_plan(&report(Vec::new()), false);
        assert!(text.ends_with("No changes. Devices match the manifest."));
    }

    #[test]
    fn plain_is_one_change_per_line() {
        let r = report(vec![change(Action::Delete, "stray", Vec::new())]);
        assert_eq!(plain_changes(&r), "delete haproxy_acl stray@fw01");
    }
}
