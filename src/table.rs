use serde::Serialize;
use std::collections::HashSet;

use crate::error::{ExtractError, Result};
use crate::record::{Record, Schema, Value};

/// Ordered records sharing one schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    schema: Schema,
    records: Vec<Record>,
}

impl Table {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    /// Append a record. Its field names must be exactly the schema's, in
    /// schema order.
    pub fn push(&mut self, record: Record) -> Result<()> {
        if !record.names().eq(self.schema.names()) {
            let got: Vec<&str> = record.names().collect();
            let want: Vec<&str> = self.schema.names().collect();
            return Err(ExtractError::InvalidSchema(format!(
                "record fields {:?} do not match schema {:?}",
                got, want
            )));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of one column in row order, or `None` for an unknown column.
    pub fn column<'a>(&'a self, name: &'a str) -> Option<impl Iterator<Item = &'a Value> + 'a> {
        if !self.schema.contains(name) {
            return None;
        }
        Some(self.records.iter().filter_map(move |r| r.get(name)))
    }

    /// Keep only the named columns, in the order given.
    pub fn select(&self, names: &[&str]) -> Result<Table> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let ty = self
                .schema
                .field_type(name)
                .ok_or_else(|| ExtractError::InvalidSchema(format!("unknown column '{}'", name)))?;
            columns.push((name.to_string(), ty.clone()));
        }
        Ok(Table {
            schema: Schema::new(columns),
            records: self.records.iter().map(|r| r.project(names)).collect(),
        })
    }

    /// Stable ascending sort by the given keys, earlier keys first.
    pub fn sort_by(&mut self, keys: &[&str]) -> Result<()> {
        if let Some(unknown) = keys.iter().find(|k| !self.schema.contains(k)) {
            return Err(ExtractError::InvalidSchema(format!("cannot sort by unknown column '{}'", unknown)));
        }
        self.records.sort_by(|a, b| {
            keys.iter()
                .map(|k| match (a.get(k), b.get(k)) {
                    (Some(x), Some(y)) => x.sort_cmp(y),
                    _ => std::cmp::Ordering::Equal,
                })
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(())
    }

    /// Append all records of `other`. Both tables must share a schema.
    pub fn concat(&mut self, other: Table) -> Result<()> {
        if other.schema != self.schema {
            return Err(ExtractError::InvalidSchema(
                "cannot concatenate tables with different schemas".into(),
            ));
        }
        self.records.extend(other.records);
        Ok(())
    }

    /// Drop rows identical to an earlier row.
    pub fn dedup(&mut self) {
        let mut seen = HashSet::new();
        self.records.retain(|r| {
            let key: Vec<Value> = r.values().cloned().collect();
            seen.insert(key)
        });
    }

    pub(crate) fn retain_cloned<F: Fn(&Record) -> bool>(&self, keep: F) -> Table {
        Table {
            schema: self.schema.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl Serialize for Table {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.records.serialize(serializer)
    }
}
