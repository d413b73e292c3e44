//! Rendering of result tables to stdout.
//!
//! Four formats: an aligned text table (the default), CSV, a JSON array and
//! newline-delimited JSON. Row and column limits only apply to the text
//! table; the machine-readable formats always carry every row and column.

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

use crate::models::{Record, Value};

/// Rows and columns shown by `--short`.
pub const SHORT_LIMIT: usize = 8;

/// Longest cell, in characters, before it is truncated.
const MAX_CELL_CHARS: usize = 40;

const ELLIPSIS: &str = "…";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
    Ndjson,
}

/// Display limits for the text table. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableLimits {
    pub rows: Option<usize>,
    pub cols: Option<usize>,
}

impl TableLimits {
    /// Negative counts mean unlimited; `short` replaces both with
    /// [`SHORT_LIMIT`].
    pub fn from_cli(rows: i64, cols: i64, short: bool) -> Self {
        if short {
            return Self {
                rows: Some(SHORT_LIMIT),
                cols: Some(SHORT_LIMIT),
            };
        }
        let limit = |n: i64| usize::try_from(n).ok();
        Self {
            rows: limit(rows),
            cols: limit(cols),
        }
    }
}

pub fn render<R: Record + Serialize>(
    rows: &[R],
    format: OutputFormat,
    limits: TableLimits,
) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(rows, limits)),
        OutputFormat::Csv => render_csv(rows),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(rows)? + "\n"),
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for row in rows {
                out.push_str(&serde_json::to_string(row)?);
                out.push('\n');
            }
            Ok(out)
        }
    }
}

fn render_csv<R: Record>(rows: &[R]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(R::schema().iter().map(|f| f.name))?;

    for row in rows {
        wtr.write_record(row.values().iter().map(csv_cell))?;
    }

    let bytes = wtr.into_inner().map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(String::from_utf8(bytes)?)
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Indices to show out of `len`, with `None` marking the elided middle.
fn visible(len: usize, limit: Option<usize>) -> Vec<Option<usize>> {
    match limit {
        Some(limit) if len > limit => {
            let head = limit.div_ceil(2);
            let tail = limit / 2;
            let mut out: Vec<Option<usize>> = (0..head).map(Some).collect();
            out.push(None);
            out.extend((len - tail..len).map(Some));
            out
        }
        _ => (0..len).map(Some).collect(),
    }
}

fn table_cell(value: &Value) -> String {
    let escaped = value
        .to_string()
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t");
    if escaped.chars().count() > MAX_CELL_CHARS {
        let mut cut: String = escaped.chars().take(MAX_CELL_CHARS - 1).collect();
        cut.push_str(ELLIPSIS);
        cut
    } else {
        escaped
    }
}

fn render_table<R: Record>(rows: &[R], limits: TableLimits) -> String {
    let schema = R::schema();
    let cols = visible(schema.len(), limits.cols);
    let row_idx = visible(rows.len(), limits.rows);

    let pick = |cells: &[String]| -> Vec<String> {
        cols.iter()
            .map(|c| match c {
                Some(i) => cells[*i].clone(),
                None => ELLIPSIS.to_string(),
            })
            .collect()
    };

    let names: Vec<String> = schema.iter().map(|f| f.name.to_string()).collect();
    let dtypes: Vec<String> = schema.iter().map(|f| f.dtype.to_string()).collect();
    let mut lines: Vec<Vec<String>> = vec![pick(&names), pick(&dtypes)];
    for r in &row_idx {
        match r {
            Some(i) => {
                let cells: Vec<String> = rows[*i].values().iter().map(table_cell).collect();
                lines.push(pick(&cells));
            }
            None => lines.push(vec![ELLIPSIS.to_string(); cols.len()]),
        }
    }

    let widths: Vec<usize> = (0..cols.len())
        .map(|c| lines.iter().map(|l| l[c].chars().count()).max().unwrap_or(0))
        .collect();

    let format_line = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{}{}", cell, " ".repeat(w - cell.chars().count())))
            .collect();
        padded.join(" | ").trim_end().to_string()
    };

    let mut out = format!("shape: ({}, {})\n", rows.len(), schema.len());
    out.push_str(&format_line(&lines[0]));
    out.push('\n');
    out.push_str(&format_line(&lines[1]));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');
    for line in &lines[2..] {
        out.push_str(&format_line(line));
        out.push('\n');
    }
    out
}
