use std::io::{self, Write};

use serde::Serialize;
use thiserror::Error;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub fn print_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<(), OutputError> {
    let payload = serde_json::to_string_pretty(value)?;
    writeln!(out, "{payload}")?;
    Ok(())
}

/// One object per line, for streams.
pub fn print_json_line<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<(), OutputError> {
    let payload = serde_json::to_string(value)?;
    writeln!(out, "{payload}")?;
    Ok(())
}

/// A column title and the widest the column may grow.
pub struct Column {
    pub title: &'static str,
    pub max_width: usize,
}

impl Column {
    pub const fn new(title: &'static str, max_width: usize) -> Self {
        Self { title, max_width }
    }
}

pub fn print_table(
    out: &mut dyn Write,
    columns: &[Column],
    rows: &[Vec<String>],
) -> Result<(), OutputError> {
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            rows.iter()
                .filter_map(|row| row.get(index))
                .map(|cell| display_width(cell))
                .fold(display_width(column.title), usize::max)
                .min(column.max_width)
        })
        .collect();

    let header: Vec<String> = columns.iter().map(|column| column.title.to_string()).collect();
    write_row(out, &header, &widths)?;
    for row in rows {
        write_row(out, row, &widths)?;
    }
    Ok(())
}

fn write_row(out: &mut dyn Write, cells: &[String], widths: &[usize]) -> Result<(), OutputError> {
    let line = widths
        .iter()
        .enumerate()
        .map(|(index, width)| {
            let cell = cells.get(index).map(String::as_str).unwrap_or("-");
            pad_right(&truncate_display(cell, *width), *width)
        })
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(out, "{}", line.trim_end())?;
    Ok(())
}

pub fn display_width(value: &str) -> usize {
    UnicodeWidthStr::width(value)
}

pub fn truncate_display(value: &str, max_width: usize) -> String {
    if display_width(value) <= max_width {
        return value.to_string();
    }
    let ellipsis = "...";
    let mut width = 0usize;
    let mut output = String::new();
    for ch in value.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + ch_width + ellipsis.len() > max_width {
            break;
        }
        output.push(ch);
        width += ch_width;
    }
    output.push_str(ellipsis);
    output
}

fn pad_right(value: &str, width: usize) -> String {
    let mut output = value.to_string();
    let current = display_width(value);
    if current < width {
        output.push_str(&" ".repeat(width - current));
    }
    output
}

/// Collapses whitespace so message bodies fit on one table line.
pub fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
