//! Declarative locators: where a record starts and how each field is found
//! inside it.
//!
//! Locators are plain data until they are compiled. Compilation is where
//! malformed CSS selectors and regex patterns surface as
//! [`ExtractError::InvalidLocator`]; a locator that simply matches nothing is
//! never an error.

use regex::Regex;
use scraper::Selector;
use tracing::debug;

use crate::error::{ExtractError, Result};
use crate::record::{FieldType, Value};

/// A CSS selector expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    expr: String,
}

impl Locator {
    pub fn css(expr: impl Into<String>) -> Self {
        Self { expr: expr.into() }
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn compile(&self) -> Result<Selector> {
        if self.expr.trim().is_empty() {
            return Err(ExtractError::invalid_locator(&self.expr, "empty selector"));
        }
        debug!("compiling selector '{}'", self.expr);
        Selector::parse(&self.expr).map_err(|e| ExtractError::invalid_locator(&self.expr, e))
    }
}

/// Identifies the repeating elements that each become one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBoundaryLocator(pub Locator);

impl RecordBoundaryLocator {
    pub fn css(expr: impl Into<String>) -> Self {
        Self(Locator::css(expr))
    }

    pub fn compile(&self) -> Result<Selector> {
        self.0.compile()
    }
}

/// What to read from the matched element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExtractMode {
    /// Descendant text with whitespace collapsed.
    #[default]
    Text,
    /// Raw attribute value.
    Attr(String),
    /// Attribute value resolved against the source's base URL.
    Link(String),
    InnerHtml,
}

/// Where a field's raw value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// Element inside the record boundary. `None` reads the boundary itself.
    Element {
        selector: Option<Locator>,
        mode: ExtractMode,
    },
    /// Fixed value stamped onto every record, e.g. the sport a page lists.
    Constant(String),
}

/// Rule for extracting one named field from a record boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLocator {
    pub name: String,
    pub source: FieldSource,
    pub pattern: Option<String>,
    pub field_type: FieldType,
    pub default: Option<Value>,
}

impl FieldLocator {
    /// Text of the first element matching `selector` within the boundary.
    pub fn text(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::element(name, Some(Locator::css(selector)), ExtractMode::Text)
    }

    /// Text of the boundary element itself.
    pub fn own_text(name: impl Into<String>) -> Self {
        Self::element(name, None, ExtractMode::Text)
    }

    pub fn attr(name: impl Into<String>, selector: impl Into<String>, attr: impl Into<String>) -> Self {
        Self::element(name, Some(Locator::css(selector)), ExtractMode::Attr(attr.into()))
    }

    pub fn link(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::element(name, Some(Locator::css(selector)), ExtractMode::Link("href".to_string()))
    }

    pub fn constant(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: FieldSource::Constant(value.into()),
            pattern: None,
            field_type: FieldType::Text,
            default: None,
        }
    }

    pub fn element(name: impl Into<String>, selector: Option<Locator>, mode: ExtractMode) -> Self {
        Self {
            name: name.into(),
            source: FieldSource::Element { selector, mode },
            pattern: None,
            field_type: FieldType::Text,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn compile(&self) -> Result<CompiledField> {
        let source = match &self.source {
            FieldSource::Element { selector, mode } => CompiledSource::Element {
                selector: selector.as_ref().map(Locator::compile).transpose()?,
                mode: mode.clone(),
            },
            FieldSource::Constant(value) => CompiledSource::Constant(value.clone()),
        };
        let pattern = self
            .pattern
            .as_deref()
            .map(|p| Regex::new(p).map_err(|e| ExtractError::invalid_locator(p, e)))
            .transpose()?;

        Ok(CompiledField {
            name: self.name.clone(),
            source,
            pattern,
            field_type: self.field_type.clone(),
            default: self.default.clone(),
        })
    }
}

#[derive(Debug)]
pub(crate) enum CompiledSource {
    Element {
        selector: Option<Selector>,
        mode: ExtractMode,
    },
    Constant(String),
}

/// A field locator with its selector and pattern parsed.
#[derive(Debug)]
pub struct CompiledField {
    pub(crate) name: String,
    pub(crate) source: CompiledSource,
    pub(crate) pattern: Option<Regex>,
    pub(crate) field_type: FieldType,
    pub(crate) default: Option<Value>,
}

impl CompiledField {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply the optional pattern: capture group 1 when the pattern has one,
    /// otherwise the whole match. `None` when the pattern does not match.
    pub(crate) fn refine(&self, raw: String) -> Option<String> {
        match &self.pattern {
            None => Some(raw),
            Some(re) => {
                let caps = re.captures(&raw)?;
                caps.get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str().trim().to_string())
            }
        }
    }

    /// Value used when the field is missing or fails conversion.
    pub(crate) fn fallback(&self) -> Value {
        self.default.clone().unwrap_or(Value::Empty)
    }
}
