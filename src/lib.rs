//! Declarative tabular extraction for high school sports rosters and
//! schedules.
//!
//! The core is [`extractor::extract`]: given a queried [`source::Source`], a
//! record boundary and named field locators, it returns a [`table::Table`].
//! Per-site selectors live in TOML [`plan::Plan`] files, and
//! [`runner::PlanRunner`] fetches the pages a plan lists.

pub mod config;
pub mod constants;
pub mod error;
pub mod export;
pub mod extractor;
pub mod filter;
pub mod locator;
pub mod logging;
pub mod plan;
pub mod record;
pub mod runner;
pub mod source;
pub mod table;

pub use error::{ExtractError, Result};
pub use extractor::extract;
pub use filter::{filter, FilterCriteria};
pub use locator::{FieldLocator, RecordBoundaryLocator};
pub use record::{FieldType, Record, Schema, Value};
pub use table::Table;
