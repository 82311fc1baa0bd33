use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::record::Record;
use crate::table::Table;

/// Allowed values per field. A record passes when, for every field listed,
/// its value rendered as text is one of the allowed values. Fields not listed
/// are unconstrained; a listed field the record lacks never matches.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterCriteria {
    allowed: BTreeMap<String, BTreeSet<String>>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add allowed values for `field`, extending any already present.
    pub fn allow<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.allowed
            .entry(field.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Replace the allowed set for `field`.
    pub fn set<I, V>(&mut self, field: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.allowed
            .insert(field.into(), values.into_iter().map(Into::into).collect());
    }

    /// Criteria from `other` replace ours field by field.
    pub fn merged_with(&self, other: &FilterCriteria) -> FilterCriteria {
        let mut merged = self.clone();
        for (field, values) in &other.allowed {
            merged.allowed.insert(field.clone(), values.clone());
        }
        merged
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.allowed.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.allowed.iter().all(|(field, values)| {
            record
                .get(field)
                .map(|v| values.contains(&v.to_string()))
                .unwrap_or(false)
        })
    }

    /// Parse a CLI-style `field=a,b,c` argument.
    pub fn parse_arg(arg: &str) -> Option<(String, Vec<String>)> {
        let (field, values) = arg.split_once('=')?;
        let field = field.trim();
        if field.is_empty() {
            return None;
        }
        let values = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .collect();
        Some((field.to_string(), values))
    }
}

/// Records of `table` that satisfy `criteria`, in their original order. The
/// input table is left untouched.
pub fn filter(table: &Table, criteria: &FilterCriteria) -> Table {
    if criteria.is_empty() {
        return table.clone();
    }
    table.retain_cloned(|r| criteria.matches(r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldType, Schema, Value};

    fn athletes() -> Table {
        let schema = Schema::new(vec![
            ("name".to_string(), FieldType::Text),
            ("sport".to_string(), FieldType::Text),
            ("grade".to_string(), FieldType::Integer),
        ]);
        let mut table = Table::new(schema);
        let rows = [
            ("Ava Smith", "Football", Value::Integer(12)),
            ("Ben Ortiz", "Soccer", Value::Integer(11)),
            ("Cam Diaz", "Football", Value::Empty),
            ("Dee Park", "Basketball", Value::Integer(9)),
        ];
        for (name, sport, grade) in rows {
            table
                .push(
                    vec![("name", Value::from(name)), ("sport", Value::from(sport)), ("grade", grade)]
                        .into_iter()
                        .collect(),
                )
                .unwrap();
        }
        table
    }

    #[test]
    fn empty_criteria_returns_equal_table() {
        let table = athletes();
        assert_eq!(filter(&table, &FilterCriteria::new()), table);
    }

    #[test]
    fn every_kept_record_satisfies_membership() {
        let criteria = FilterCriteria::new()
            .allow("sport", ["Football", "Basketball"])
            .allow("grade", ["12", "9"]);
        let out = filter(&athletes(), &criteria);

        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| criteria.matches(r)));
        let names: Vec<String> = out.column("name").unwrap().map(|v| v.to_string()).collect();
        assert_eq!(names, vec!["Ava Smith", "Dee Park"]);
    }

    #[test]
    fn filter_is_idempotent_and_does_not_mutate_input() {
        let table = athletes();
        let criteria = FilterCriteria::new().allow("sport", ["Football"]);
        let once = filter(&table, &criteria);
        let twice = filter(&once, &criteria);

        assert_eq!(once, twice);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn unknown_field_matches_nothing() {
        let criteria = FilterCriteria::new().allow("season", ["2024"]);
        assert!(filter(&athletes(), &criteria).is_empty());
    }

    #[test]
    fn merged_criteria_override_per_field() {
        let base = FilterCriteria::new().allow("sport", ["Football"]).allow("grade", ["12"]);
        let cli = FilterCriteria::new().allow("sport", ["Soccer"]);
        let merged = base.merged_with(&cli);

        let out = filter(&athletes(), &merged);
        assert!(out.is_empty());
        assert_eq!(merged.fields().collect::<Vec<_>>(), vec!["grade", "sport"]);
    }

    #[test]
    fn parse_arg_splits_values() {
        assert_eq!(
            FilterCriteria::parse_arg("sport=Football, Soccer"),
            Some(("sport".to_string(), vec!["Football".to_string(), "Soccer".to_string()]))
        );
        assert_eq!(FilterCriteria::parse_arg("sport"), None);
        assert_eq!(FilterCriteria::parse_arg("=x"), None);
    }
}
