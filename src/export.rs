use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::error::{ExtractError, Result};
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn ext(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    /// Format implied by a file extension, if recognised.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|e| e.to_str()).and_then(|e| e.parse().ok())
    }
}

impl FromStr for ExportFormat {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(ExtractError::Config(format!("unknown export format '{}'", other))),
        }
    }
}

/// Header row of schema names, then one row per record.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(table.schema().names())?;
    for record in table {
        wtr.write_record(record.values().map(|v| v.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn to_csv_string(table: &Table) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    String::from_utf8(buf).map_err(|e| ExtractError::Config(format!("CSV output was not UTF-8: {}", e)))
}

/// Array of objects, keys in schema order.
pub fn write_json<W: Write>(table: &Table, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, table)?;
    Ok(())
}

pub fn write_table<W: Write>(table: &Table, writer: W, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Csv => write_csv(table, writer),
        ExportFormat::Json => write_json(table, writer),
    }
}

/// Write `table` to `path`, creating parent directories as needed.
pub fn export_to_path(table: &Table, path: &Path, format: ExportFormat) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    write_table(table, &mut writer, format)?;
    writer.flush()?;
    info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldType, Schema, Value};
    use chrono::NaiveDate;

    fn meets() -> Table {
        let schema = Schema::new(vec![
            ("meet".to_string(), FieldType::Text),
            ("date".to_string(), FieldType::Date { format: "%m/%d/%Y".into() }),
            ("location".to_string(), FieldType::Text),
        ]);
        let mut table = Table::new(schema);
        table
            .push(
                vec![
                    ("meet", Value::from("Palatine Invite, Varsity")),
                    ("date", Value::Date(NaiveDate::from_ymd_opt(2024, 9, 7).unwrap())),
                    ("location", Value::Empty),
                ]
                .into_iter()
                .collect(),
            )
            .unwrap();
        table
    }

    #[test]
    fn csv_has_schema_header_and_quotes_commas() {
        let out = to_csv_string(&meets()).unwrap();
        assert_eq!(out, "meet,date,location\n\"Palatine Invite, Varsity\",2024-09-07,\n");
    }

    #[test]
    fn empty_table_still_writes_header() {
        let table = Table::new(meets().schema().clone());
        assert_eq!(to_csv_string(&table).unwrap(), "meet,date,location\n");
    }

    #[test]
    fn json_preserves_field_order() {
        let mut buf = Vec::new();
        write_json(&meets(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let meet_at = text.find("\"meet\"").unwrap();
        let date_at = text.find("\"date\"").unwrap();
        assert!(meet_at < date_at);
        assert!(text.contains("\"location\": null"));
    }

    #[test]
    fn export_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/meets.csv");
        export_to_path(&meets(), &path, ExportFormat::from_path(&path).unwrap()).unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("meet,date,location"));
    }
}
