//! Markdown rendering of a batch.
//!
//! Output is a stable external format: scripts extract everything between the sentinels,
//! so marker text, section titles and column order must not change.

use std::fmt::Write;

use crate::aggregate::{BatchReport, GroupStats, SegmentStats};
use crate::decompose::MetricRow;

pub const BEGIN_MARKER: &str = "===BEGIN_RESULT_MD===";
pub const END_MARKER: &str = "===END_RESULT_MD===";

const ROW_HEADERS: [&str; 8] = [
    "iter",
    "totalMs",
    "sendToQueueMs",
    "queueWaitMs",
    "workerMs",
    "overheadMs",
    "wallMs",
    "reportedMs",
];
const ROW_RIGHT: [bool; 8] = [true; 8];

const SUMMARY_HEADERS: [&str; 6] = [
    "metric",
    "totalMs",
    "sendToQueueMs",
    "queueWaitMs",
    "workerMs",
    "overheadMs",
];
const SUMMARY_RIGHT: [bool; 6] = [false, true, true, true, true, true];

fn pad_cell(s: &str, width: usize, right: bool) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let pad = " ".repeat(width - len);
    if right {
        format!("{pad}{s}")
    } else {
        format!("{s}{pad}")
    }
}

/// Render one table. Column width is the widest of header and cells; missing cells are blank.
pub fn format_markdown_table(headers: &[&str], right_align: &[bool], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for r in rows {
        for (w, cell) in widths.iter_mut().zip(r) {
            *w = (*w).max(cell.chars().count());
        }
    }
    let right = |i: usize| right_align.get(i).copied().unwrap_or(false);

    let mut out = String::from("|");
    for (i, h) in headers.iter().enumerate() {
        out.push(' ');
        out.push_str(&pad_cell(h, widths[i], right(i)));
        out.push_str(" |");
    }
    out.push_str("\n|");
    for (i, w) in widths.iter().enumerate() {
        let n = (*w).max(3);
        out.push(' ');
        if right(i) {
            out.push_str(&"-".repeat(n - 1));
            out.push(':');
        } else {
            out.push_str(&"-".repeat(n));
        }
        out.push_str(" |");
    }
    out.push('\n');

    for r in rows {
        out.push('|');
        for (i, w) in widths.iter().enumerate() {
            let cell = r.get(i).map(String::as_str).unwrap_or("");
            out.push(' ');
            out.push_str(&pad_cell(cell, *w, right(i)));
            out.push_str(" |");
        }
        out.push('\n');
    }
    out
}

fn row_cells(m: &MetricRow) -> Vec<String> {
    [
        m.iteration as i64,
        m.total_ms,
        m.send_to_queue_ms,
        m.queue_wait_ms,
        m.worker_ms,
        m.overhead_ms,
        m.wall_ms,
        m.reported_ms,
    ]
    .iter()
    .map(i64::to_string)
    .collect()
}

fn summary_rows(g: &GroupStats) -> Vec<Vec<String>> {
    let segs = [g.total, g.send_to_queue, g.queue_wait, g.worker, g.overhead];
    let line = |label: &str, f: &dyn Fn(&SegmentStats) -> String| {
        std::iter::once(label.to_string())
            .chain(segs.iter().map(f))
            .collect::<Vec<_>>()
    };
    vec![
        line("avg", &|s| format!("{:.3}", s.avg)),
        line("min", &|s| s.min.to_string()),
        line("max", &|s| s.max.to_string()),
    ]
}

/// The four report sections.
pub fn render_tables(report: &BatchReport) -> String {
    let mut out = String::new();

    out.push_str("### Latency Breakdown (ms)\n\n");
    let rows: Vec<_> = report.rows.iter().map(row_cells).collect();
    out.push_str(&format_markdown_table(&ROW_HEADERS, &ROW_RIGHT, &rows));

    out.push_str("\n### Cold Start (iter=1)\n\n");
    out.push_str(&format_markdown_table(
        &ROW_HEADERS,
        &ROW_RIGHT,
        &[row_cells(&report.cold)],
    ));

    out.push_str("\n### Warm Summary (iter=2..N)\n\n");
    let warm = match &report.warm {
        Some(g) => summary_rows(g),
        None => vec![std::iter::once("warm")
            .chain(std::iter::repeat("n/a").take(5))
            .map(str::to_string)
            .collect()],
    };
    out.push_str(&format_markdown_table(&SUMMARY_HEADERS, &SUMMARY_RIGHT, &warm));

    out.push_str("\n### All Summary (iter=1..N)\n\n");
    out.push_str(&format_markdown_table(
        &SUMMARY_HEADERS,
        &SUMMARY_RIGHT,
        &summary_rows(&report.all),
    ));
    out
}

/// Header lines plus tables, wrapped in the extraction sentinels.
pub fn render_result(backend: &str, api: &str, report: &BatchReport) -> String {
    let mut body = String::new();
    let _ = write!(body, "executionBackend={backend}\napi={api}\n\n");
    body.push_str(&render_tables(report));

    let mut out = String::with_capacity(body.len() + 48);
    out.push_str(BEGIN_MARKER);
    out.push('\n');
    out.push_str(&body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(END_MARKER);
    out.push('\n');
    out
}
