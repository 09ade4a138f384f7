use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use orca_sightings::schema::catalog;
use orca_sightings::{Category, Dashboard, DashboardConfig, DateRange, Dimension, FilterState};
use serde::Serialize;
use tracing::{error, info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "orca-sightings")]
#[command(
    author,
    version,
    about = "Explore orca sightings: counts, summary, map events and relation graph"
)]
struct Cli {
    /// Sightings CSV file
    data: PathBuf,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    filters: FilterArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Keep only these groups (repeatable)
    #[arg(long = "group", global = true)]
    groups: Vec<String>,

    /// Keep only these individuals (repeatable)
    #[arg(long = "individual", global = true)]
    individuals: Vec<String>,

    /// Keep only these locations (repeatable)
    #[arg(long = "location", global = true)]
    locations: Vec<String>,

    /// Keep only these sex values (repeatable)
    #[arg(long = "sex", global = true)]
    sexes: Vec<String>,

    /// Keep only these stranding values (repeatable)
    #[arg(long = "strands", global = true)]
    strands: Vec<String>,

    /// First day of the date range (YYYY-MM-DD); defaults to the earliest sighting
    #[arg(long, global = true)]
    from: Option<NaiveDate>,

    /// Last day of the date range (YYYY-MM-DD); defaults to the latest sighting
    #[arg(long, global = true)]
    to: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cascaded filter options for the current selection
    Options,

    /// Value counts of one category
    Counts {
        #[arg(short = 'k', long, value_enum, default_value = "sex")]
        category: CategoryArg,
    },

    /// Individual-level metrics and catalog
    Summary,

    /// Write the filtered catalog as CSV
    Catalog {
        /// Output file (default: orcas_filtradas.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Map events with coordinates
    Map,

    /// Relation graph: nodes, edges and legend
    Graph,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CategoryArg {
    Sex,
    Individual,
    Group,
    Location,
    Strands,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Sex => Category::Sex,
            CategoryArg::Individual => Category::Individual,
            CategoryArg::Group => Category::Group,
            CategoryArg::Location => Category::Location,
            CategoryArg::Strands => Category::Strands,
        }
    }
}

impl FilterArgs {
    /// Selections from the flags on top of the dashboard's default state.
    fn to_state(&self, dashboard: &Dashboard) -> FilterState {
        let mut state = dashboard
            .default_filter()
            .with(Dimension::Group, self.groups.iter().cloned())
            .with(Dimension::Individual, self.individuals.iter().cloned())
            .with(Dimension::Location, self.locations.iter().cloned())
            .with(Dimension::Sex, self.sexes.iter().cloned())
            .with(Dimension::Strands, self.strands.iter().cloned());

        let bounds = state.date_range.map(|r| (r.start, r.end));
        let start = self.from.or(bounds.map(|b| b.0));
        let end = self.to.or(bounds.map(|b| b.1));
        if let (Some(start), Some(end)) = (start, end) {
            state.date_range = Some(DateRange::new(start, end));
        }
        state
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => DashboardConfig::from_yaml_file(path)?,
        None => DashboardConfig::default(),
    };
    let dashboard = Dashboard::open(&cli.data, config)?;
    for warning in dashboard.store().warnings() {
        eprintln!("warning: {warning}");
    }

    let requested = cli.filters.to_state(&dashboard);
    let (state, options) = dashboard.reconcile(&requested)?;
    if state != requested {
        warn!("Dropped selections not offered by the current filter options");
    }

    match cli.command {
        Command::Options => print_json(&options)?,
        Command::Counts { category } => {
            print_json(&dashboard.category_chart(&state, category.into())?)?
        }
        Command::Summary => print_json(&dashboard.summary(&state)?)?,
        Command::Catalog { output } => {
            let path = output.unwrap_or_else(|| PathBuf::from(catalog::FILE_NAME));
            fs::write(&path, dashboard.catalog_csv(&state)?)
                .with_context(|| format!("writing catalog to {}", path.display()))?;
            info!("Catalog written to {:?}", path);
        }
        Command::Map => print_json(&dashboard.map_events(&state)?)?,
        Command::Graph => print_json(&dashboard.graph_scene(&state)?)?,
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
