//! In-memory representation of a decoded source.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use super::normalize::{parse_float, parse_int};

/// A single decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Timestamp(NaiveDateTime),
}

/// Rows of cells addressed by normalized column name.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given (already normalized) columns.
    ///
    /// When two headers normalize to the same name, the first one wins.
    pub fn new(columns: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self {
            columns,
            index,
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded with nulls, long rows truncated.
    pub fn push_row(&mut self, mut values: Vec<Value>) {
        values.resize(self.columns.len(), Value::Null);
        self.rows.push(values);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row {
            index: &self.index,
            values,
        })
    }
}

/// Borrowed view of one row with typed accessors.
///
/// Every accessor returns `None` for absent columns, null cells and
/// cells that do not parse as the requested type.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    index: &'a HashMap<String, usize>,
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.index.get(column).and_then(|&i| self.values.get(i))
    }

    pub fn text(&self, column: &str) -> Option<&'a str> {
        match self.get(column)? {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn string(&self, column: &str) -> Option<String> {
        self.text(column).map(str::to_string)
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        self.text(column).and_then(parse_int)
    }

    pub fn float(&self, column: &str) -> Option<f64> {
        self.text(column).and_then(parse_float)
    }

    pub fn timestamp(&self, column: &str) -> Option<NaiveDateTime> {
        match self.get(column)? {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}
