//! In-memory table of text cells with named columns. Cell access by name
//! distinguishes an absent column (`None`) from a blank value (`Some("")`).

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, Default)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(position, column)| (column.clone(), position))
            .collect();
        Table {
            name: name.into(),
            columns,
            index,
            rows: Vec::new(),
        }
    }

    /// Source label used in diagnostics, usually the input file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Vec<String>] {
        &mut self.rows
    }

    /// Appends a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    /// Keeps only the rows for which `keep` returns true.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[String]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    /// Returns the cell text, or `None` when the column does not exist or
    /// the row index is out of range. A blank cell is `Some("")`.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let position = self.column_index(column)?;
        self.cell_at(row, position)
    }

    pub fn cell_at(&self, row: usize, position: usize) -> Option<&str> {
        self.rows.get(row)?.get(position).map(String::as_str)
    }

    /// Index of `name`, appending an empty column when absent.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(position) = self.column_index(name) {
            return position;
        }
        let position = self.columns.len();
        self.columns.push(name.to_string());
        self.index.insert(name.to_string(), position);
        for row in &mut self.rows {
            row.push(String::new());
        }
        position
    }

    /// Renames a column in place. Does nothing when `from` is absent or
    /// `to` already exists.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        if self.index.contains_key(to) {
            return false;
        }
        let Some(position) = self.index.remove(from) else {
            return false;
        };
        self.columns[position] = to.to_string();
        self.index.insert(to.to_string(), position);
        true
    }

    /// Renders an aligned ASCII preview of up to `limit` rows (all rows
    /// when `None`).
    pub fn render(&self, limit: Option<usize>) -> String {
        let shown = limit.unwrap_or(self.rows.len()).min(self.rows.len());
        render_rows(&self.columns, &self.rows[..shown])
    }

    pub fn print(&self, limit: Option<usize>) {
        print!("{}", self.render(limit));
    }
}

fn render_rows(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();

    let header_line = format_row(headers, &widths);
    let _ = writeln!(output, "{header_line}");

    let separator_cells = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let separator_line = format_row(&separator_cells, &widths);
    let _ = writeln!(output, "{separator_line}");

    for row in rows {
        let row_line = format_row(row, &widths);
        let _ = writeln!(output, "{row_line}");
    }

    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let sanitized = sanitize_cell(value);
        let display = display_width(sanitized.as_ref());
        let mut cell = sanitized.into_owned();
        let padding = widths[idx].saturating_sub(display);
        if padding > 0 {
            cell.push_str(&" ".repeat(padding));
        }
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        let mut sanitized = String::with_capacity(value.len());
        for ch in value.chars() {
            match ch {
                '\n' | '\r' | '\t' => sanitized.push(' '),
                other => sanitized.push(other),
            }
        }
        Cow::Owned(sanitized)
    } else {
        Cow::Borrowed(value)
    }
}
