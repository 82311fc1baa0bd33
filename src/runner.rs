use reqwest::Url;
use tracing::{info, info_span, warn, Instrument};

#[cfg(feature = "browser")]
use crate::config::BrowserConfig;
use crate::config::AppConfig;
use crate::error::{ExtractError, Result};
use crate::extractor::{extract, schema_for};
use crate::filter::{filter, FilterCriteria};
use crate::locator::Locator;
use crate::plan::{PageSpec, Plan, RenderMode};
use crate::source::http::HttpFetcher;
use crate::source::HtmlDocument;
use crate::table::Table;

/// Runs a [`Plan`] page by page and assembles one table.
pub struct PlanRunner {
    #[cfg(feature = "browser")]
    browser: BrowserConfig,
    fetcher: HttpFetcher,
}

impl PlanRunner {
    pub fn new(config: AppConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.http)?;
        Ok(Self {
            #[cfg(feature = "browser")]
            browser: config.browser,
            fetcher,
        })
    }

    /// Acquire and extract every page in order, then apply the plan's
    /// filters (overridden per field by `extra_filters`), dedup and sort.
    /// The first page that fails aborts the run.
    pub async fn run(&self, plan: &Plan, extra_filters: &FilterCriteria) -> Result<Table> {
        plan.validate()?;
        if plan.pages.is_empty() {
            return Err(ExtractError::Config(format!("plan '{}' lists no pages", plan.name)));
        }

        let mut table = Table::new(schema_for(&plan.field_locators_for(&plan.pages[0])?)?);
        for page in &plan.pages {
            let span = info_span!("page", plan = %plan.name, url = %page.url);
            let document = self.acquire(page).instrument(span.clone()).await?;
            let _enter = span.enter();

            table.concat(extract_page(plan, page, &document)?)?;
        }

        finish(plan, table, extra_filters)
    }

    /// Extract from HTML already on hand, using the first page's variables
    /// (or none when the plan lists no pages).
    pub fn run_offline(
        &self,
        plan: &Plan,
        html: &str,
        base_url: Option<&str>,
        extra_filters: &FilterCriteria,
    ) -> Result<Table> {
        plan.validate()?;
        let mut document = HtmlDocument::parse(html);
        if let Some(base) = base_url {
            let url = Url::parse(base).map_err(|e| ExtractError::Config(format!("invalid base URL '{}': {}", base, e)))?;
            document = document.with_base_url(url);
        }

        let page = plan.pages.first().cloned().unwrap_or_else(|| PageSpec {
            url: base_url.unwrap_or_default().to_string(),
            vars: Default::default(),
            render: RenderMode::Http,
            scroll: false,
            click: Vec::new(),
            scope: None,
        });
        let table = extract_page(plan, &page, &document)?;
        finish(plan, table, extra_filters)
    }

    async fn acquire(&self, page: &PageSpec) -> Result<HtmlDocument> {
        match page.render {
            RenderMode::Http => self.fetcher.fetch(&page.url).await,
            RenderMode::Browser => self.acquire_rendered(page).await,
        }
    }

    #[cfg(feature = "browser")]
    async fn acquire_rendered(&self, page: &PageSpec) -> Result<HtmlDocument> {
        use crate::source::browser::BrowserSession;

        let mut session = BrowserSession::launch(&self.browser).await?;
        let result = drive_session(&mut session, page).await;
        // Close on every path; a close failure must not mask the page result
        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }
        result
    }

    #[cfg(not(feature = "browser"))]
    async fn acquire_rendered(&self, page: &PageSpec) -> Result<HtmlDocument> {
        Err(ExtractError::Config(format!(
            "page {} needs a browser; rebuild with `--features browser`",
            page.url
        )))
    }
}

#[cfg(feature = "browser")]
async fn drive_session(session: &mut crate::source::browser::BrowserSession, page: &PageSpec) -> Result<HtmlDocument> {
    session.open(&page.url).await?;
    for selector in &page.click {
        session.click(selector).await?;
    }
    if page.scroll {
        let rounds = session.scroll_to_end().await?;
        info!("Scrolling loaded more rows {} times", rounds);
    }
    session.snapshot().await
}

fn extract_page(plan: &Plan, page: &PageSpec, document: &HtmlDocument) -> Result<Table> {
    let fields = plan.field_locators_for(page)?;
    let boundary = plan.boundary();

    match &page.scope {
        None => extract(document, &boundary, &fields, None),
        Some(scope) => {
            let selector = Locator::css(scope).compile()?;
            match document.scope(&selector) {
                Some(scoped) => extract(&scoped, &boundary, &fields, None),
                None => {
                    warn!("Scope '{}' not found on {}", scope, page.url);
                    // Still validate locators and return a correctly shaped table
                    extract(&HtmlDocument::parse(""), &boundary, &fields, None)
                }
            }
        }
    }
}

fn finish(plan: &Plan, table: Table, extra_filters: &FilterCriteria) -> Result<Table> {
    let criteria = plan.filters.merged_with(extra_filters);
    let mut table = filter(&table, &criteria);
    if plan.dedup {
        table.dedup();
    }
    if !plan.sort_by.is_empty() {
        let keys: Vec<&str> = plan.sort_by.iter().map(String::as_str).collect();
        table.sort_by(&keys)?;
    }
    info!("Plan '{}' produced {} records", plan.name, table.len());
    Ok(table)
}
