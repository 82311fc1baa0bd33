use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use hs_scraper::config::AppConfig;
use hs_scraper::export::{export_to_path, write_table, ExportFormat};
use hs_scraper::filter::FilterCriteria;
use hs_scraper::logging;
use hs_scraper::plan::Plan;
use hs_scraper::runner::PlanRunner;
use hs_scraper::table::Table;

#[derive(Parser)]
#[command(name = "hs_scraper")]
#[command(about = "Extract high school sports rosters and schedules into tables")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every page a plan lists and export the combined table
    Run {
        /// Extraction plan (TOML)
        #[arg(long)]
        plan: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Extract from a saved HTML file instead of fetching
    Extract {
        #[arg(long)]
        plan: PathBuf,
        /// Local HTML file
        #[arg(long)]
        html: PathBuf,
        /// URL relative links in the file resolve against
        #[arg(long)]
        base_url: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Check that plans parse and every locator compiles
    Validate {
        /// Plan to check; repeat for several
        #[arg(long = "plan", required = true)]
        plans: Vec<PathBuf>,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Keep only rows whose field is one of the values, e.g. `sport=Football,Soccer`
    #[arg(long = "filter", value_name = "FIELD=V1,V2")]
    filters: Vec<String>,
    /// Output file; the table goes to stdout when omitted
    #[arg(long, conflicts_with = "save")]
    out: Option<PathBuf>,
    /// Write to `<output.dir>/<plan name>.<ext>` from the config file
    #[arg(long)]
    save: bool,
    /// csv or json; defaults to the output file extension, then csv
    #[arg(long)]
    format: Option<String>,
    /// Only these columns, in this order (comma-separated)
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,
}

impl OutputArgs {
    fn criteria(&self) -> anyhow::Result<FilterCriteria> {
        let mut criteria = FilterCriteria::new();
        for arg in &self.filters {
            let Some((field, values)) = FilterCriteria::parse_arg(arg) else {
                bail!("invalid --filter '{}', expected FIELD=V1,V2", arg);
            };
            criteria.set(field, values);
        }
        Ok(criteria)
    }

    fn format(&self) -> anyhow::Result<ExportFormat> {
        if let Some(f) = &self.format {
            return Ok(f.parse::<ExportFormat>()?);
        }
        Ok(self
            .out
            .as_deref()
            .and_then(ExportFormat::from_path)
            .unwrap_or_default())
    }

    fn emit(&self, table: Table, plan: &Plan, config: &AppConfig) -> anyhow::Result<()> {
        let table = if self.columns.is_empty() {
            table
        } else {
            let names: Vec<&str> = self.columns.iter().map(String::as_str).collect();
            table.select(&names)?
        };
        let format = self.format()?;
        let out = match (&self.out, self.save) {
            (Some(path), _) => Some(path.clone()),
            (None, true) => Some(config.output.dir.join(format!("{}.{}", plan.name, format.ext()))),
            (None, false) => None,
        };

        match &out {
            Some(path) => {
                let written = export_to_path(&table, path, format)?;
                println!("Wrote {} rows to {}", table.len(), written.display());
            }
            None => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                write_table(&table, &mut handle, format)?;
                handle.flush()?;
            }
        }
        Ok(())
    }
}

fn validate_plans(paths: &[PathBuf]) -> bool {
    let mut ok = true;
    for path in paths {
        match Plan::load(path).and_then(|plan| plan.validate().map(|_| plan)) {
            Ok(plan) => println!("ok      {} ({}, {} pages)", path.display(), plan.name, plan.pages.len()),
            Err(e) => {
                ok = false;
                error!("Plan {} is invalid: {}", path.display(), e);
                println!("invalid {}: {}", path.display(), e);
            }
        }
    }
    ok
}

fn read_html(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = logging::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { plan, output } => {
            let config = AppConfig::load()?;
            let plan = Plan::load(&plan)?;
            let criteria = output.criteria()?;
            info!("Running plan '{}'", plan.name);

            let runner = PlanRunner::new(config.clone())?;
            let table = runner.run(&plan, &criteria).await?;
            output.emit(table, &plan, &config)?;
        }
        Commands::Extract {
            plan,
            html,
            base_url,
            output,
        } => {
            let config = AppConfig::load()?;
            let plan = Plan::load(&plan)?;
            let body = read_html(&html)?;
            let criteria = output.criteria()?;

            let runner = PlanRunner::new(config.clone())?;
            let table = runner.run_offline(&plan, &body, base_url.as_deref(), &criteria)?;
            output.emit(table, &plan, &config)?;
        }
        Commands::Validate { plans } => {
            if !validate_plans(&plans) {
                bail!("one or more plans failed validation");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_takes_repeated_plan_flags() {
        let cli = Cli::try_parse_from(["hs_scraper", "validate", "--plan", "a.toml", "--plan", "b.toml"]).unwrap();
        match cli.command {
            Commands::Validate { plans } => {
                assert_eq!(plans, vec![PathBuf::from("a.toml"), PathBuf::from("b.toml")])
            }
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn validate_requires_a_plan() {
        assert!(Cli::try_parse_from(["hs_scraper", "validate"]).is_err());
        assert!(Cli::try_parse_from(["hs_scraper", "validate", "a.toml"]).is_err());
    }
}
