//! Generic record extraction: one pass over the boundary matches of a source,
//! one record per match.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::error::{ExtractError, Result};
use crate::filter::{filter, FilterCriteria};
use crate::locator::{CompiledField, CompiledSource, ExtractMode, FieldLocator, RecordBoundaryLocator};
use crate::record::{Record, Schema, Value};
use crate::source::{Element, Source};
use crate::table::Table;

/// Extract one record per element matched by `boundary`.
///
/// All locators are compiled before the source is queried. A field that
/// finds nothing, or whose text does not convert to the declared type, takes
/// its default (or `Value::Empty`) instead of failing the extraction.
pub fn extract<S: Source>(
    source: &S,
    boundary: &RecordBoundaryLocator,
    fields: &[FieldLocator],
    filters: Option<&FilterCriteria>,
) -> Result<Table> {
    let schema = schema_for(fields)?;
    let boundary_selector = boundary.compile()?;
    let compiled = fields.iter().map(FieldLocator::compile).collect::<Result<Vec<_>>>()?;

    let source_id = source.source_id();
    let elements = source.query(&boundary_selector)?;
    debug!("{} boundary matches for '{}' in {}", elements.len(), boundary.0.expr(), source_id);

    let mut table = Table::new(schema);
    for element in &elements {
        let record = compiled
            .iter()
            .map(|field| (field.name.clone(), field_value(source, element, field)))
            .collect::<Record>();
        table.push(record)?;
    }

    info!("Extracted {} records from {}", table.len(), source_id);
    if table.is_empty() {
        warn!(
            "No records matched '{}' in {} - the page structure may have changed",
            boundary.0.expr(),
            source_id
        );
    }

    Ok(match filters {
        Some(criteria) => filter(&table, criteria),
        None => table,
    })
}

/// Schema implied by a set of field locators. Fails on an empty set or a
/// repeated name.
pub fn schema_for(fields: &[FieldLocator]) -> Result<Schema> {
    if fields.is_empty() {
        return Err(ExtractError::InvalidSchema("at least one field locator is required".into()));
    }
    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field.name.as_str()) {
            return Err(ExtractError::InvalidSchema(format!("duplicate field '{}'", field.name)));
        }
    }
    Ok(Schema::new(
        fields
            .iter()
            .map(|f| (f.name.clone(), f.field_type.clone()))
            .collect(),
    ))
}

fn field_value<S: Source, E: Element>(source: &S, boundary: &E, field: &CompiledField) -> Value {
    let raw = match &field.source {
        CompiledSource::Constant(value) => Some(value.clone()),
        CompiledSource::Element { selector, mode } => match selector {
            Some(sel) => boundary.find(sel).and_then(|found| read(source, &found, mode)),
            None => read(source, boundary, mode),
        },
    };

    let Some(text) = raw.filter(|t| !t.is_empty()).and_then(|t| field.refine(t)) else {
        return field.fallback();
    };
    if text.is_empty() {
        return field.fallback();
    }

    match field.field_type.convert(&text) {
        Some(value) => value,
        None => {
            warn!("Field '{}' value '{}' does not match its declared type; using fallback", field.name, text);
            field.fallback()
        }
    }
}

fn read<S: Source, E: Element>(source: &S, element: &E, mode: &ExtractMode) -> Option<String> {
    match mode {
        ExtractMode::Text => Some(element.text()),
        ExtractMode::InnerHtml => Some(element.inner_html().trim().to_string()),
        ExtractMode::Attr(name) => element.attr(name),
        ExtractMode::Link(name) => {
            let href = element.attr(name)?;
            match source.base_url() {
                Some(base) => base.join(&href).ok().map(|u| u.to_string()).or(Some(href)),
                None => Some(href),
            }
        }
    }
}
