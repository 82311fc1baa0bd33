//! Extraction plans: per-site selector configuration loaded from TOML.
//!
//! A plan names the record boundary, the fields, the pages to visit and any
//! default filters or sort keys. Site knowledge lives in these files, not in
//! code; see `sites/` for the bundled ones.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ExtractError, Result};
use crate::extractor::schema_for;
use crate::filter::FilterCriteria;
use crate::locator::{ExtractMode, FieldLocator, Locator, RecordBoundaryLocator};
use crate::record::{FieldType, Value};

static TEMPLATE_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Plain HTTP GET.
    #[default]
    Http,
    /// Headless browser; needed for pages that build rows with script.
    Browser,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageSpec {
    pub url: String,
    /// Values substituted into `{name}` placeholders of constant fields.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    #[serde(default)]
    pub render: RenderMode,
    /// Scroll until the page stops growing before extracting. Browser only.
    #[serde(default)]
    pub scroll: bool,
    /// Selectors clicked in order before extracting. Browser only.
    #[serde(default)]
    pub click: Vec<String>,
    /// Only extract inside the first element matching this selector.
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TypeName {
    #[default]
    Text,
    Integer,
    Boolean,
    Date,
}

/// A default as written in the plan. Strings stay text whatever they look
/// like.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum DefaultValue {
    Boolean(bool),
    Integer(i64),
    Text(String),
}

impl From<&DefaultValue> for Value {
    fn from(default: &DefaultValue) -> Self {
        match default {
            DefaultValue::Boolean(b) => Value::Boolean(*b),
            DefaultValue::Integer(n) => Value::Integer(*n),
            DefaultValue::Text(s) => Value::Text(s.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    selector: Option<String>,
    #[serde(default)]
    attr: Option<String>,
    /// Attribute to resolve as a URL against the page address.
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    html: bool,
    #[serde(default)]
    constant: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default, rename = "type")]
    kind: TypeName,
    /// chrono format string for `type = "date"`.
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    default: Option<DefaultValue>,
}

impl FieldSpec {
    fn to_locator(&self, vars: &BTreeMap<String, String>) -> Result<FieldLocator> {
        let field_type = match (self.kind, &self.format) {
            (TypeName::Text, _) => FieldType::Text,
            (TypeName::Integer, _) => FieldType::Integer,
            (TypeName::Boolean, _) => FieldType::Boolean,
            (TypeName::Date, Some(format)) => FieldType::Date { format: format.clone() },
            (TypeName::Date, None) => {
                return Err(ExtractError::Config(format!(
                    "field '{}' has type \"date\" but no format",
                    self.name
                )))
            }
        };

        let mut locator = match &self.constant {
            Some(template) => {
                if self.selector.is_some() {
                    return Err(ExtractError::Config(format!(
                        "field '{}' cannot have both a selector and a constant",
                        self.name
                    )));
                }
                FieldLocator::constant(&self.name, render_template(template, vars)?)
            }
            None => {
                let mode = match (&self.attr, &self.link, self.html) {
                    (None, None, false) => ExtractMode::Text,
                    (Some(attr), None, false) => ExtractMode::Attr(attr.clone()),
                    (None, Some(link), false) => ExtractMode::Link(link.clone()),
                    (None, None, true) => ExtractMode::InnerHtml,
                    _ => {
                        return Err(ExtractError::Config(format!(
                            "field '{}' may use only one of attr, link, html",
                            self.name
                        )))
                    }
                };
                FieldLocator::element(&self.name, self.selector.as_deref().map(Locator::css), mode)
            }
        };

        locator = locator.with_type(field_type);
        if let Some(pattern) = &self.pattern {
            locator = locator.with_pattern(pattern.clone());
        }
        if let Some(default) = &self.default {
            locator = locator.with_default(Value::from(default));
        }
        Ok(locator)
    }
}

/// Substitute `{name}` placeholders from `vars`. An unknown name is a
/// configuration error.
pub fn render_template(template: &str, vars: &BTreeMap<String, String>) -> Result<String> {
    let mut missing = None;
    let rendered = TEMPLATE_VAR.replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
        Some(v) => v.clone(),
        None => {
            missing.get_or_insert_with(|| caps[1].to_string());
            String::new()
        }
    });
    match missing {
        Some(name) => Err(ExtractError::Config(format!(
            "template '{}' references undefined variable '{}'",
            template, name
        ))),
        None => Ok(rendered.into_owned()),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub boundary: String,
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub pages: Vec<PageSpec>,
    #[serde(default)]
    pub filters: FilterCriteria,
    #[serde(default)]
    pub sort_by: Vec<String>,
    #[serde(default)]
    pub dedup: bool,
}

impl Plan {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ExtractError::Config(format!("Failed to read plan '{}': {}", path.display(), e)))?;
        let plan = Self::from_toml_str(&content)?;
        info!("Loaded plan '{}' from {} ({} pages)", plan.name, path.display(), plan.pages.len());
        Ok(plan)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn boundary(&self) -> RecordBoundaryLocator {
        RecordBoundaryLocator::css(&self.boundary)
    }

    /// Field locators with constant templates rendered from `vars`.
    pub fn field_locators(&self, vars: &BTreeMap<String, String>) -> Result<Vec<FieldLocator>> {
        self.fields.iter().map(|f| f.to_locator(vars)).collect()
    }

    pub fn field_locators_for(&self, page: &PageSpec) -> Result<Vec<FieldLocator>> {
        self.field_locators(&page.vars)
    }

    /// Compile every locator against every page's variables and check that
    /// filter and sort keys name real fields.
    pub fn validate(&self) -> Result<()> {
        self.boundary().compile()?;

        let empty = BTreeMap::new();
        let var_sets: Vec<&BTreeMap<String, String>> = if self.pages.is_empty() {
            vec![&empty]
        } else {
            self.pages.iter().map(|p| &p.vars).collect()
        };

        for vars in var_sets {
            let locators = self.field_locators(vars)?;
            let schema = schema_for(&locators)?;
            for locator in &locators {
                locator.compile()?;
            }
            for key in self.filters.fields().chain(self.sort_by.iter().map(String::as_str)) {
                if !schema.contains(key) {
                    return Err(ExtractError::Config(format!(
                        "plan '{}' filters or sorts on unknown field '{}'",
                        self.name, key
                    )));
                }
            }
        }

        for page in &self.pages {
            if let Some(scope) = &page.scope {
                Locator::css(scope).compile()?;
            }
            if page.render == RenderMode::Http && (page.scroll || !page.click.is_empty()) {
                return Err(ExtractError::Config(format!(
                    "page {} uses scroll/click but is not rendered in a browser",
                    page.url
                )));
            }
        }

        debug!("plan '{}' validated", self.name);
        Ok(())
    }

    pub fn needs_browser(&self) -> bool {
        self.pages.iter().any(|p| p.render == RenderMode::Browser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::FieldSource;

    const PLAN: &str = r#"
        name = "roster"
        boundary = "tbody tr"
        sort_by = ["name"]

        [[fields]]
        name = "name"
        selector = "td.name a"

        [[fields]]
        name = "grade"
        selector = "td.grade"
        type = "integer"
        default = "N/A"

        [[fields]]
        name = "sport"
        constant = "{sport} ({level})"

        [[pages]]
        url = "https://example.com/football/roster"
        vars = { sport = "Football", level = "Varsity" }

        [filters]
        sport = ["Football (Varsity)"]
    "#;

    #[test]
    fn parses_fields_and_pages() {
        let plan = Plan::from_toml_str(PLAN).unwrap();
        assert_eq!(plan.fields.len(), 3);
        assert_eq!(plan.pages[0].render, RenderMode::Http);
        plan.validate().unwrap();

        let locators = plan.field_locators_for(&plan.pages[0]).unwrap();
        assert_eq!(locators[1].field_type, FieldType::Integer);
        assert_eq!(locators[1].default, Some(Value::from("N/A")));
        assert_eq!(locators[2].source, FieldSource::Constant("Football (Varsity)".to_string()));
    }

    #[test]
    fn unknown_template_variable_is_config_error() {
        let vars = BTreeMap::from([("sport".to_string(), "Soccer".to_string())]);
        assert_eq!(render_template("{sport}", &vars).unwrap(), "Soccer");
        assert!(matches!(render_template("{season}", &vars), Err(ExtractError::Config(_))));
    }

    #[test]
    fn filter_on_unknown_field_fails_validation() {
        let plan = Plan::from_toml_str(&PLAN.replace("[filters]\n        sport", "[filters]\n        season")).unwrap();
        assert!(matches!(plan.validate(), Err(ExtractError::Config(_))));
    }

    #[test]
    fn malformed_boundary_fails_validation() {
        let plan = Plan::from_toml_str(&PLAN.replace("tbody tr", "tbody >> tr[")).unwrap();
        assert!(matches!(plan.validate(), Err(ExtractError::InvalidLocator { .. })));
    }

    #[test]
    fn scroll_requires_browser_render() {
        let toml = PLAN.replace(
            "vars = { sport = \"Football\", level = \"Varsity\" }",
            "vars = { sport = \"Football\", level = \"Varsity\" }\n        scroll = true",
        );
        let plan = Plan::from_toml_str(&toml).unwrap();
        assert!(matches!(plan.validate(), Err(ExtractError::Config(_))));
    }

    #[test]
    fn date_like_default_on_text_field_stays_text() {
        let toml = PLAN.replace(
            "type = \"integer\"\n        default = \"N/A\"",
            "default = \"2024-09-14\"",
        );
        let plan = Plan::from_toml_str(&toml).unwrap();
        let locators = plan.field_locators_for(&plan.pages[0]).unwrap();
        assert_eq!(locators[1].field_type, FieldType::Text);
        assert_eq!(locators[1].default, Some(Value::from("2024-09-14")));
    }

    #[test]
    fn scalar_defaults_keep_their_toml_type() {
        let plan = Plan::from_toml_str(&PLAN.replace("default = \"N/A\"", "default = 0")).unwrap();
        let locators = plan.field_locators_for(&plan.pages[0]).unwrap();
        assert_eq!(locators[1].default, Some(Value::Integer(0)));
    }

    #[test]
    fn date_without_format_is_rejected() {
        let toml = PLAN.replace("type = \"integer\"", "type = \"date\"");
        let plan = Plan::from_toml_str(&toml).unwrap();
        assert!(matches!(plan.validate(), Err(ExtractError::Config(_))));
    }
}
