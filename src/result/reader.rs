use std::sync::Arc;

use super::{DataRow, DataTable};
use crate::core::Row;
use crate::driver::ConnectionGuard;

/// Forward-only row stream returned by `Database::execute_reader`.
///
/// The driver's result set is fully loaded before the reader is returned, so
/// iteration never touches the driver and large results are held in memory.
///
/// When the reader was produced outside an ambient transaction it owns the
/// private connection it ran on; that connection is closed as soon as the rows
/// are exhausted or the reader is dropped or closed, whichever happens first.
pub struct DataReader {
    columns: Arc<[String]>,
    rows: std::vec::IntoIter<Row>,
    connection: Option<ConnectionGuard>,
}

impl DataReader {
    pub(crate) fn new(table: DataTable, connection: Option<ConnectionGuard>) -> Self {
        let (columns, rows) = table.into_parts();
        Self {
            columns,
            rows: rows.into_iter(),
            connection,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether the reader still keeps a private connection open.
    pub fn holds_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Discards the remaining rows and releases the connection.
    pub fn close(&mut self) {
        self.rows = Vec::new().into_iter();
        self.connection = None;
    }
}

impl Iterator for DataReader {
    type Item = DataRow;

    fn next(&mut self) -> Option<DataRow> {
        match self.rows.next() {
            Some(values) => Some(DataRow::new(Arc::clone(&self.columns), values)),
            None => {
                self.connection = None;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl std::fmt::Debug for DataReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataReader")
            .field("columns", &self.columns)
            .field("remaining", &self.rows.len())
            .field("holds_connection", &self.holds_connection())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    #[test]
    fn test_detached_reader_yields_rows() {
        let table = DataTable::new(
            vec!["n".into()],
            vec![vec![Value::Integer(1)], vec![Value::Integer(2)]],
        );
        let reader = DataReader::new(table, None);
        assert!(!reader.holds_connection());

        let values: Vec<i64> = reader
            .map(|row| row.get(0).and_then(Value::as_i64).unwrap())
            .collect();
        assert_eq!(values, [1, 2]);
    }
}
