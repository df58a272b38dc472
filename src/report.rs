use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt};

use crate::error::ReportError;
use crate::model::AnnotatedCandle;

const COLUMNS: [(&str, usize); 8] = [
    ("date", 20),
    ("range", 10),
    ("pivot", 5),
    ("type", 10),
    ("valid", 7),
    ("invalidDate", 20),
    ("retest", 17),
    ("retestDate", 20),
];

/// Output format for the `analyze` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Table,
    Json,
}

/// Fixed-width table of the annotated series, one row per candle.
pub fn render_table(rows: &[AnnotatedCandle]) -> String {
    let mut out = String::new();
    push_row(&mut out, COLUMNS.map(|(name, _)| name.to_string()));
    for row in rows {
        push_row(&mut out, cells(row));
    }
    out
}

/// The annotated series as a pretty-printed JSON array.
pub fn to_json(rows: &[AnnotatedCandle]) -> Result<String, Report<ReportError>> {
    serde_json::to_string_pretty(rows)
        .change_context(ReportError::Serialize)
        .attach_with(|| format!("rows: {}", rows.len()))
}

fn cells(row: &AnnotatedCandle) -> [String; 8] {
    let annotation = &row.annotation;
    let zone = annotation.zone.as_ref();
    let retest = annotation.retest.as_ref();

    [
        date(row.candle.timestamp),
        zone.map(|z| format!("{:.4}", z.range)).unwrap_or_default(),
        annotation.pivot.map(|p| p.to_string()).unwrap_or_default(),
        zone.map(|z| z.zone_type.to_string()).unwrap_or_default(),
        zone.map(|z| z.valid.to_string()).unwrap_or_default(),
        zone.and_then(|z| z.invalid_date).map(date).unwrap_or_default(),
        retest.map(|r| r.retest.to_string()).unwrap_or_default(),
        retest.map(|r| date(r.retest_date)).unwrap_or_default(),
    ]
}

fn date(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn push_row(out: &mut String, cells: [String; 8]) {
    let line = cells
        .iter()
        .zip(COLUMNS)
        .map(|(cell, (_, width))| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ");
    out.push_str(line.trim_end());
    out.push('\n');
}
