//! Row assembly.
//!
//! Rows arrive either whole (a mapping, a positional tuple, or a single
//! value when the file has no columns) or piecewise, one column at a time
//! through a pending row. Piecewise assignments append their blob
//! immediately; only the locator slot waits in memory until the row is
//! committed.

use std::collections::HashSet;
use std::sync::Arc;

use crate::blob::BlobRef;
use crate::errors::{FddError, Result};
use crate::value::Value;

/// A whole row as supplied to [`Writer::set`](crate::writer::Writer::set).
#[derive(Debug, Clone)]
pub enum RowInput {
    /// The entire record as one value; the only form accepted by files
    /// without columns.
    Value(Value),
    /// One value per declared column, in declaration order.
    Positional(Vec<Value>),
    /// Values for a subset of columns by name; unnamed columns are stored
    /// absent.
    Named(Vec<(String, Value)>),
}

impl RowInput {
    /// Convenience constructor for the named form.
    pub fn named<N, V>(fields: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<Value>,
    {
        RowInput::Named(
            fields
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        )
    }

    /// Convenience constructor for the positional form.
    pub fn positional<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        RowInput::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Normalises the input into one value per column, validating names
    /// and arity against the declaration. `Null` marks absent fields.
    pub(crate) fn into_column_values(self, columns: &[String]) -> Result<Vec<Value>> {
        match self {
            RowInput::Value(_) => Err(FddError::SchemaMismatch(
                "file declares columns; supply a positional or named row".into(),
            )),
            RowInput::Positional(values) => {
                if values.len() != columns.len() {
                    return Err(FddError::SchemaMismatch(format!(
                        "row has {} values, file declares {} columns",
                        values.len(),
                        columns.len()
                    )));
                }
                Ok(values)
            }
            RowInput::Named(fields) => {
                let mut seen: HashSet<&str> = HashSet::new();
                for (name, _) in &fields {
                    if !columns.iter().any(|c| c == name) {
                        return Err(FddError::SchemaMismatch(format!(
                            "row names unknown column '{}'",
                            name
                        )));
                    }
                    if !seen.insert(name.as_str()) {
                        return Err(FddError::SchemaMismatch(format!(
                            "row names column '{}' twice",
                            name
                        )));
                    }
                }
                if fields.is_empty() {
                    return Err(FddError::SchemaMismatch(
                        "row names no columns at all".into(),
                    ));
                }
                let mut values = vec![Value::Null; columns.len()];
                for (name, value) in fields {
                    if let Some(pos) = columns.iter().position(|c| *c == name) {
                        values[pos] = value;
                    }
                }
                Ok(values)
            }
        }
    }
}

impl From<Value> for RowInput {
    fn from(v: Value) -> Self {
        RowInput::Value(v)
    }
}

impl From<&str> for RowInput {
    fn from(s: &str) -> Self {
        RowInput::Value(Value::from(s))
    }
}

impl From<String> for RowInput {
    fn from(s: String) -> Self {
        RowInput::Value(Value::from(s))
    }
}

impl From<i64> for RowInput {
    fn from(i: i64) -> Self {
        RowInput::Value(Value::from(i))
    }
}

impl From<Vec<Value>> for RowInput {
    fn from(values: Vec<Value>) -> Self {
        RowInput::Positional(values)
    }
}

impl From<Vec<(String, Value)>> for RowInput {
    fn from(fields: Vec<(String, Value)>) -> Self {
        RowInput::Named(fields)
    }
}

/// A partially populated row.
///
/// Lifecycle: allocated empty (NEW), gains slots as columns are assigned
/// (PARTIAL), and leaves the pending table when committed to the index
/// (COMMITTED) on explicit finalise, when the last column is assigned, or
/// at writer close, whichever happens first.
#[derive(Debug)]
pub(crate) struct PendingRow {
    slots: Vec<Option<BlobRef>>,
    filled: usize,
}

impl PendingRow {
    pub(crate) fn new(column_count: usize) -> Self {
        PendingRow {
            slots: vec![None; column_count],
            filled: 0,
        }
    }

    /// Stores the blob for one column. Re-assigning a column within a
    /// pending row is rejected; blobs are never rewritten.
    pub(crate) fn fill(&mut self, position: usize, blob: BlobRef, column: &str) -> Result<()> {
        if self.slots[position].is_some() {
            return Err(FddError::BadState(format!(
                "column '{}' was already assigned for this row",
                column
            )));
        }
        self.slots[position] = Some(blob);
        self.filled += 1;
        Ok(())
    }

    /// True once every column has been assigned.
    pub(crate) fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    pub(crate) fn slots(&self) -> &[Option<BlobRef>] {
        &self.slots
    }

    pub(crate) fn into_slots(self) -> Vec<Option<BlobRef>> {
        self.slots
    }
}

/// An owned, fully materialised row.
///
/// This is what the writer's mapping surface returns: values are decoded
/// eagerly, with `Null` standing in for columns not yet assigned.
#[derive(Debug, Clone)]
pub struct RowSnapshot {
    columns: Option<Arc<[String]>>,
    values: Vec<Value>,
}

impl RowSnapshot {
    pub(crate) fn unstructured(value: Value) -> Self {
        RowSnapshot {
            columns: None,
            values: vec![value],
        }
    }

    pub(crate) fn columnar(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        RowSnapshot {
            columns: Some(columns),
            values,
        }
    }

    /// The whole value of an unstructured record.
    pub fn value(&self) -> Result<&Value> {
        match self.columns {
            None => Ok(&self.values[0]),
            Some(_) => Err(FddError::SchemaMismatch(
                "record is columnar; access columns by name or index".into(),
            )),
        }
    }

    pub fn by_index(&self, position: usize) -> Result<&Value> {
        self.values.get(position).ok_or_else(|| {
            FddError::NotFound(format!("column index {} out of range", position))
        })
    }

    pub fn by_name(&self, name: &str) -> Result<&Value> {
        let columns = self.columns.as_ref().ok_or_else(|| {
            FddError::SchemaMismatch("record is unstructured; use value()".into())
        })?;
        let position = columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| FddError::NotFound(format!("column '{}'", name)))?;
        Ok(&self.values[position])
    }

    /// Mapping-style access: `None` when the column does not exist.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.by_name(name).ok()
    }

    /// All values in column order (a single element when unstructured).
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["text".to_string(), "label".to_string()]
    }

    #[test]
    fn named_rows_fill_missing_columns_with_null() {
        let input = RowInput::named([("text", Value::from("A"))]);
        let values = input.into_column_values(&columns()).unwrap();
        assert_eq!(values, vec![Value::from("A"), Value::Null]);
    }

    #[test]
    fn named_rows_reject_unknown_columns() {
        let input = RowInput::named([("no_such", Value::from(1i64))]);
        assert!(matches!(
            input.into_column_values(&columns()),
            Err(FddError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn positional_rows_must_match_arity() {
        let input = RowInput::positional([Value::from("A")]);
        assert!(input.into_column_values(&columns()).is_err());
    }

    #[test]
    fn whole_value_rejected_for_columnar_files() {
        let input = RowInput::from("just a value");
        assert!(input.into_column_values(&columns()).is_err());
    }

    #[test]
    fn pending_row_completes_when_full() {
        let mut row = PendingRow::new(2);
        assert!(!row.is_complete());
        row.fill(1, BlobRef { offset: 0, len: 3 }, "label").unwrap();
        row.fill(0, BlobRef { offset: 3, len: 4 }, "text").unwrap();
        assert!(row.is_complete());
    }

    #[test]
    fn pending_row_rejects_reassignment() {
        let mut row = PendingRow::new(1);
        row.fill(0, BlobRef { offset: 0, len: 1 }, "text").unwrap();
        assert!(row.fill(0, BlobRef { offset: 1, len: 1 }, "text").is_err());
    }

    #[test]
    fn snapshot_accessors_agree() {
        let columns: Arc<[String]> = columns().into();
        let snapshot =
            RowSnapshot::columnar(columns, vec![Value::from("A"), Value::from(1i64)]);
        assert_eq!(snapshot.by_name("text").unwrap(), &Value::from("A"));
        assert_eq!(snapshot.by_index(1).unwrap(), &Value::from(1i64));
        assert_eq!(snapshot.get("label"), Some(&Value::from(1i64)));
        assert!(snapshot.get("missing").is_none());
        assert!(snapshot.value().is_err());
    }
}
