//! Text rendering of a [`Report`]. Pure: same report, same text.

use crate::report::{Check, Report, ZoneEntry};
use crate::techniques::MetricsRecord;

pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "gux: {} ({}\u{d7}{}) spec {} palette v{}, {} zones\n",
        report.page,
        report.image.width,
        report.image.height,
        short_digest(&report.spec_digest),
        report.palette_version,
        report.zones.len()
    ));
    if let Some(reference) = &report.reference {
        out.push_str(&format!(
            "reference: {}\u{d7}{}\n",
            reference.width, reference.height
        ));
    }
    out.push_str(&format!("techniques: {}\n\n", report.techniques.join(", ")));

    for zone in &report.zones {
        render_zone(&mut out, zone);
        out.push('\n');
    }

    let s = &report.summary;
    out.push_str(&format!(
        "PASS {}/{} zones  FAIL {}/{} zones  UNVERIFIED {}/{} zones\n",
        s.passed, s.total, s.failed, s.total, s.unverified, s.total
    ));
    out.push_str(&format!(
        "colour failures: {}  structural failures: {}  required unverified: {}\n",
        s.colour_failures, s.structural_failures, s.required_unverified
    ));
    out.push_str(&format!(
        "result: {} (exit {})\n",
        if s.gate_passed() { "PASS" } else { "FAIL" },
        s.exit_code
    ));
    out
}

fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

fn render_zone(out: &mut String, zone: &ZoneEntry) {
    let bounds = zone.bounds.map(|b| b.to_string()).unwrap_or_default();
    out.push_str(&format!(
        "\u{2500}\u{2500} {} {} {}\n",
        zone.path,
        bounds,
        zone.verdict.label()
    ));
    if let Some(doc) = &zone.doc {
        for line in doc.lines() {
            out.push_str(&format!("  /// {line}\n"));
        }
    }

    for record in &zone.metrics {
        out.push_str(&format!("  {}\n", summarise_metrics(record)));
    }
    for check in &zone.checks {
        out.push_str(&format!("  {}\n", render_check(check)));
    }
    for subject in &zone.unmeasured {
        out.push_str(&format!("  ? {subject}: not measured\n"));
    }
    for failure in &zone.errors {
        out.push_str(&format!("  ! {}: {}\n", failure.technique, failure.error));
    }
    for warning in &zone.warnings {
        out.push_str(&format!("  warning: {warning}\n"));
    }
    for note in &zone.notes {
        out.push_str(&format!("  note: {note}\n"));
    }
}

fn render_check(check: &Check) -> String {
    let mark = if check.passed { '\u{2713}' } else { '\u{2717}' };
    let mut line = format!(
        "{mark} {} {}: {:.1} {} {:.1}",
        check.kind.as_str(),
        check.subject,
        check.measured,
        check.comparison.symbol(),
        check.threshold
    );
    if let Some(detail) = &check.detail {
        line.push_str(&format!("  ({detail})"));
    }
    line
}

fn summarise_metrics(record: &MetricsRecord) -> String {
    match record {
        MetricsRecord::Colours(m) => {
            let parts: Vec<String> = m
                .dominant
                .iter()
                .map(|d| match &d.name {
                    Some(name) => format!("{} {name} {:.1}%", d.colour, d.percentage),
                    None => format!("{} {:.1}%", d.colour, d.percentage),
                })
                .collect();
            format!("colours: {}", parts.join(", "))
        }
        MetricsRecord::Lines(m) => format!(
            "transitions: h={:.1} v={:.1} avg/line",
            m.horizontal.mean, m.vertical.mean
        ),
        MetricsRecord::Census(m) => {
            let top: Vec<String> = m
                .entries
                .iter()
                .take(3)
                .map(|e| format!("{}:{:.1}%", e.name, e.percentage))
                .collect();
            format!("census: {}", top.join(", "))
        }
        MetricsRecord::Regions(m) => format!(
            "sub-regions: {} detected ({}x{} grid)",
            m.count, m.columns, m.rows
        ),
        MetricsRecord::Compare(m) => format!("diff: {:.2}% mismatch", m.mismatch_pct),
        MetricsRecord::CensusDiff(m) => format!(
            "census shift: {:.1}{}",
            m.distance,
            if m.dominant_changed {
                ", dominant changed"
            } else {
                ""
            }
        ),
    }
}
