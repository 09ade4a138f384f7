//! Core of the orca sightings dashboard: load the sightings table once,
//! filter it, and compute the chart, summary, map and relation graph views
//! for external renderers.

pub mod aggregation;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod filter;
pub mod graph;
pub mod layout;
pub mod model;
pub mod schema;
pub mod store;
pub mod visualization;

#[cfg(feature = "python")]
mod python;

pub use aggregation::{Category, CatalogEntry, Summary, ValueCount};
pub use config::DashboardConfig;
pub use dashboard::Dashboard;
pub use error::{DashboardError, EmptyResultWarning, ParseWarning, Result};
pub use events::Event;
pub use filter::{DateRange, Dimension, FilterOptions, FilterState};
pub use graph::CooccurrenceGraph;
pub use model::SightingRecord;
pub use store::DatasetStore;
pub use visualization::GraphScene;
