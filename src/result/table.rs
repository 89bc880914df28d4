use std::fmt;
use std::sync::Arc;

use crate::core::{Row, Value};

/// A fully materialized result set.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    columns: Arc<[String]>,
    rows: Vec<Row>,
}

impl DataTable {
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns: columns.into(),
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<DataRow> {
        self.rows
            .get(index)
            .map(|values| DataRow::new(Arc::clone(&self.columns), values.clone()))
    }

    /// First cell of the first row, if any row exists.
    pub fn scalar(&self) -> Option<Value> {
        self.rows.first().and_then(|row| row.first().cloned())
    }

    pub fn into_first_row(self) -> Option<DataRow> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .next()
            .map(|values| DataRow::new(columns, values))
    }

    pub fn iter(&self) -> impl Iterator<Item = DataRow> + '_ {
        self.rows
            .iter()
            .map(|values| DataRow::new(Arc::clone(&self.columns), values.clone()))
    }

    pub(crate) fn into_parts(self) -> (Arc<[String]>, Vec<Row>) {
        (self.columns, self.rows)
    }
}

impl fmt::Display for DataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return writeln!(f, "Empty result set");
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();
        for row in &self.rows {
            for (i, value) in row.iter().enumerate().take(widths.len()) {
                widths[i] = widths[i].max(value.to_string().len());
            }
        }

        let header: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{:width$}", col, width = widths[i]))
            .collect();
        writeln!(f, "{}", header.join(" | "))?;

        let separator: String = widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-");
        writeln!(f, "{}", separator)?;

        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .enumerate()
                .take(widths.len())
                .map(|(i, val)| format!("{:width$}", val.to_string(), width = widths[i]))
                .collect();
            writeln!(f, "{}", cells.join(" | "))?;
        }

        write!(f, "\n{} row(s)", self.rows.len())
    }
}

/// One row of a result set, addressable by position or column name.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    columns: Arc<[String]>,
    values: Row,
}

impl DataRow {
    pub(crate) fn new(columns: Arc<[String]>, values: Row) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Column lookup is case-insensitive.
    pub fn get_by_name(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
    }

    pub fn into_values(self) -> Row {
        self.values
    }
}
