use std::collections::HashSet;
use std::sync::Arc;

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::aggregation::{
    catalog_csv, dedup_by_individual, value_counts, Category, Summary, ValueCount,
};
use crate::config::DashboardConfig;
use crate::error::{EmptyResultWarning, Result};
use crate::events::{build_events, filter_events_by_known_individuals, Event};
use crate::filter::{self, DateRange, Dimension, FilterOptions, FilterState};
use crate::graph::CooccurrenceGraph;
use crate::model::{records, SightingRecord};
use crate::store::DatasetStore;
use crate::visualization::GraphScene;

/// Filters that narrow the relation graph when sex and stranding are left
/// out.
const GRAPH_DIMENSIONS: [Dimension; 3] =
    [Dimension::Group, Dimension::Individual, Dimension::Location];

/// Bars of one category chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryChart {
    pub category: Category,
    pub counts: Vec<ValueCount>,
    pub warning: Option<EmptyResultWarning>,
}

/// Summary metrics plus the empty-result flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryView {
    #[serde(flatten)]
    pub summary: Summary,
    pub warning: Option<EmptyResultWarning>,
}

/// Map markers plus the empty-result flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub events: Vec<Event>,
    pub warning: Option<EmptyResultWarning>,
}

/// Rows of the table passing a filter, as a frame and as typed records.
pub struct FilteredView {
    pub table: DataFrame,
    pub records: Vec<SightingRecord>,
}

impl FilteredView {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn warning(&self, view: &str) -> Option<EmptyResultWarning> {
        if self.is_empty() {
            warn!("{} view: {}", view, EmptyResultWarning);
            Some(EmptyResultWarning)
        } else {
            None
        }
    }
}

/// One read-only dataset, many sessions. Every view is recomputed from the
/// store on each call; nothing is cached between calls.
#[derive(Clone)]
pub struct Dashboard {
    store: Arc<DatasetStore>,
    config: DashboardConfig,
}

impl Dashboard {
    pub fn new(store: Arc<DatasetStore>, config: DashboardConfig) -> Self {
        Self { store, config }
    }

    /// Load the dataset at `path` and wrap it.
    pub fn open(path: impl AsRef<std::path::Path>, config: DashboardConfig) -> Result<Self> {
        let store = DatasetStore::load(path, &config)?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Initial state: no categorical selection, dates spanning the whole
    /// dataset. A dataset without any valid date gets no date range.
    pub fn default_filter(&self) -> FilterState {
        let state = FilterState::new();
        match self.store.date_bounds() {
            Some((start, end)) => state.with_date_range(DateRange::new(start, end)),
            None => state,
        }
    }

    pub fn filter_options(&self, state: &FilterState) -> Result<FilterOptions> {
        FilterOptions::compute(self.store.table(), state)
    }

    /// Intersect each selection with the options the cascade still offers.
    /// Returns the cleaned state together with those options.
    pub fn reconcile(&self, state: &FilterState) -> Result<(FilterState, FilterOptions)> {
        let options = self.filter_options(state)?;
        let reconciled = state.reconcile(&options);
        if reconciled != *state {
            debug!("Dropped selections no longer offered by the filter options");
        }
        Ok((reconciled, options))
    }

    pub fn filtered(&self, state: &FilterState) -> Result<FilteredView> {
        let table = filter::apply(self.store.table(), state)?;
        let records = records(&table)?;
        Ok(FilteredView { table, records })
    }

    /// Row-level counts of `category` in the filtered table.
    pub fn category_chart(&self, state: &FilterState, category: Category) -> Result<CategoryChart> {
        let view = self.filtered(state)?;
        Ok(CategoryChart {
            category,
            counts: value_counts(&view.records, category),
            warning: view.warning("chart"),
        })
    }

    pub fn summary(&self, state: &FilterState) -> Result<SummaryView> {
        let view = self.filtered(state)?;
        Ok(SummaryView {
            summary: Summary::compute(&view.records, &self.config.sentinels),
            warning: view.warning("summary"),
        })
    }

    /// The filtered catalog as CSV bytes, header included.
    pub fn catalog_csv(&self, state: &FilterState) -> Result<Vec<u8>> {
        let view = self.filtered(state)?;
        catalog_csv(&Summary::compute(&view.records, &self.config.sentinels).catalog)
    }

    /// Events come from the whole table; an event stays if any of its
    /// participants survives the filter as a primary individual.
    pub fn map_events(&self, state: &FilterState) -> Result<MapView> {
        let view = self.filtered(state)?;
        let valid: HashSet<String> = dedup_by_individual(&view.records)
            .into_iter()
            .filter_map(|r| r.individual.clone())
            .collect();
        let events = filter_events_by_known_individuals(build_events(self.store.records()), &valid);
        let warning = if events.is_empty() {
            warn!("map view: {}", EmptyResultWarning);
            Some(EmptyResultWarning)
        } else {
            None
        };
        Ok(MapView { events, warning })
    }

    /// State actually used by the relation graph.
    pub fn graph_filter(&self, state: &FilterState) -> FilterState {
        if self.config.graph.apply_sex_and_strands_filters {
            state.clone()
        } else {
            state.restricted_to(&GRAPH_DIMENSIONS)
        }
    }

    pub fn relation_graph(&self, state: &FilterState) -> Result<CooccurrenceGraph> {
        let view = self.filtered(&self.graph_filter(state))?;
        Ok(CooccurrenceGraph::from_rows(
            &view.records,
            self.config.graph.min_edge_weight,
        ))
    }

    pub fn graph_scene(&self, state: &FilterState) -> Result<GraphScene> {
        let graph = self.relation_graph(state)?;
        let mut scene = GraphScene::from_graph(&graph, &self.config.graph.layout);
        if scene.is_empty() {
            warn!("graph view: {}", EmptyResultWarning);
            scene.warning = Some(EmptyResultWarning);
        }
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{Row, TableBuilder};

    fn dashboard(config: DashboardConfig) -> Dashboard {
        let table = TableBuilder::default()
            .row(Row {
                date: Some("2023-01-05"),
                individual: "A",
                sex: "♀",
                present: "A, B",
                ..Row::default()
            })
            .row(Row {
                date: Some("2023-01-05"),
                individual: "B",
                sex: "♂",
                present: "A, B",
                ..Row::default()
            })
            .row(Row {
                date: Some("2023-03-01"),
                individual: "A",
                sex: "♀",
                present: "A, B",
                location: "Caleta Valdés",
                ..Row::default()
            })
            .build();
        let store = DatasetStore::from_table(table).unwrap();
        Dashboard::new(Arc::new(store), config)
    }

    #[test]
    fn default_filter_spans_all_dates() {
        let dash = dashboard(DashboardConfig::default());
        let range = dash.default_filter().date_range.unwrap();
        assert_eq!(range.start.to_string(), "2023-01-05");
        assert_eq!(range.end.to_string(), "2023-03-01");
        assert_eq!(dash.filtered(&dash.default_filter()).unwrap().records.len(), 3);
    }

    #[test]
    fn graph_ignores_sex_filter_unless_configured() {
        let state = FilterState::new().with(Dimension::Sex, ["♀"]);

        let dash = dashboard(DashboardConfig::default());
        let graph = dash.relation_graph(&state).unwrap();
        assert_eq!(graph.weight("A", "B"), 2);
        assert_eq!(graph.edge_count(), 1);

        let mut config = DashboardConfig::default();
        config.graph.apply_sex_and_strands_filters = true;
        let dash = dashboard(config);
        // Only A survives as a primary individual, so B is unknown.
        assert!(dash.relation_graph(&state).unwrap().is_empty());
        assert!(dash.graph_scene(&state).unwrap().warning.is_some());
    }

    #[test]
    fn empty_selection_renders_empty_views() {
        let dash = dashboard(DashboardConfig::default());
        let state = FilterState::new().with(Dimension::Individual, ["Nobody"]);

        let chart = dash.category_chart(&state, Category::Sex).unwrap();
        assert!(chart.counts.is_empty());
        assert_eq!(chart.warning, Some(EmptyResultWarning));

        let summary = dash.summary(&state).unwrap();
        assert_eq!(summary.summary.total_individuals, 0);
        assert!(summary.warning.is_some());

        assert!(dash.map_events(&state).unwrap().events.is_empty());

        let csv = String::from_utf8(dash.catalog_csv(&state).unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn reconcile_drops_an_individual_outside_the_selected_group() {
        let dash = dashboard(DashboardConfig::default());
        let state = FilterState::new()
            .with(Dimension::Group, ["G1"])
            .with(Dimension::Individual, ["Nobody"]);
        assert!(dash.filtered(&state).unwrap().is_empty());

        let (reconciled, options) = dash.reconcile(&state).unwrap();
        assert!(reconciled.individuals.is_empty());
        assert_eq!(reconciled.groups, state.groups);
        assert_eq!(options.individuals, vec!["A", "B"]);
        assert_eq!(dash.filtered(&reconciled).unwrap().records.len(), 3);
    }

    #[test]
    fn map_keeps_events_with_any_surviving_participant() {
        let dash = dashboard(DashboardConfig::default());
        let state = FilterState::new().with(Dimension::Individual, ["B"]);
        let map = dash.map_events(&state).unwrap();
        // Both distinct sightings list B, even though B is a primary
        // individual in only one of them.
        assert_eq!(map.events.len(), 2);
        assert_eq!(map.warning, None);
    }
}
