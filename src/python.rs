use std::collections::BTreeSet;

use chrono::NaiveDate;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;
use serde::Serialize;

use crate::aggregation::{catalog_frame, counts_frame, Category};
use crate::config::DashboardConfig;
use crate::dashboard::Dashboard;
use crate::events::events_frame;
use crate::filter::{DateRange, FilterState};
use crate::schema;

fn to_json<T: Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

fn parse_category(name: &str) -> PyResult<Category> {
    match name.to_lowercase().as_str() {
        "sex" | "sexo" => Ok(Category::Sex),
        "individual" | "orca" => Ok(Category::Individual),
        "group" | "grupo" => Ok(Category::Group),
        "location" | "lugar" => Ok(Category::Location),
        "strands" | "varadora" => Ok(Category::Strands),
        other => Err(PyValueError::new_err(format!("Unknown category: {other}"))),
    }
}

/// Python-side filter state. Lists are converted to sets; missing lists
/// leave their dimension unconstrained.
#[pyclass(name = "FilterState")]
#[derive(Clone)]
pub struct PyFilterState {
    inner: FilterState,
}

#[pymethods]
impl PyFilterState {
    #[new]
    #[pyo3(signature = (
        groups=None,
        individuals=None,
        locations=None,
        sexes=None,
        strands=None,
        start=None,
        end=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        groups: Option<Vec<String>>,
        individuals: Option<Vec<String>>,
        locations: Option<Vec<String>>,
        sexes: Option<Vec<String>>,
        strands: Option<Vec<String>>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> PyResult<Self> {
        let set = |v: Option<Vec<String>>| -> BTreeSet<String> {
            v.unwrap_or_default().into_iter().collect()
        };
        let date_range = match (start, end) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)),
            (None, None) => None,
            _ => return Err(PyValueError::new_err("start and end must be given together")),
        };
        Ok(Self {
            inner: FilterState {
                groups: set(groups),
                individuals: set(individuals),
                locations: set(locations),
                sexes: set(sexes),
                strands: set(strands),
                date_range,
            },
        })
    }

    fn to_json(&self) -> PyResult<String> {
        to_json(&self.inner)
    }
}

#[pyclass(name = "Dashboard")]
pub struct PyDashboard {
    inner: Dashboard,
}

#[pymethods]
impl PyDashboard {
    #[new]
    #[pyo3(signature = (path, config_path=None))]
    fn new(path: String, config_path: Option<String>) -> PyResult<Self> {
        let config = match config_path {
            Some(p) => DashboardConfig::from_yaml_file(p)?,
            None => DashboardConfig::default(),
        };
        Ok(Self {
            inner: Dashboard::open(path, config)?,
        })
    }

    fn table(&self) -> PyDataFrame {
        PyDataFrame(self.inner.store().table().clone())
    }

    fn warnings(&self) -> Vec<String> {
        self.inner
            .store()
            .warnings()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn default_filter(&self) -> PyFilterState {
        PyFilterState {
            inner: self.inner.default_filter(),
        }
    }

    /// The state with every selection the cascade no longer offers dropped.
    /// Call this after each widget change, before computing views.
    fn reconcile(&self, state: &PyFilterState) -> PyResult<PyFilterState> {
        let (inner, _) = self.inner.reconcile(&state.inner)?;
        Ok(PyFilterState { inner })
    }

    /// Cascaded widget options as JSON.
    fn filter_options(&self, state: &PyFilterState) -> PyResult<String> {
        to_json(&self.inner.filter_options(&state.inner)?)
    }

    fn filtered(&self, state: &PyFilterState) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.filtered(&state.inner)?.table))
    }

    fn category_counts(&self, state: &PyFilterState, category: &str) -> PyResult<PyDataFrame> {
        let chart = self.inner.category_chart(&state.inner, parse_category(category)?)?;
        Ok(PyDataFrame(counts_frame(&chart.counts)?))
    }

    fn summary(&self, state: &PyFilterState) -> PyResult<String> {
        to_json(&self.inner.summary(&state.inner)?)
    }

    fn catalog(&self, state: &PyFilterState) -> PyResult<PyDataFrame> {
        let view = self.inner.summary(&state.inner)?;
        Ok(PyDataFrame(catalog_frame(&view.summary.catalog)?))
    }

    fn catalog_csv(&self, state: &PyFilterState) -> PyResult<Vec<u8>> {
        Ok(self.inner.catalog_csv(&state.inner)?)
    }

    fn map_events(&self, state: &PyFilterState) -> PyResult<PyDataFrame> {
        let map = self.inner.map_events(&state.inner)?;
        Ok(PyDataFrame(events_frame(&map.events)?))
    }

    /// (nodes, edges) frames of the relation graph.
    fn graph(&self, state: &PyFilterState) -> PyResult<(PyDataFrame, PyDataFrame)> {
        let scene = self.inner.graph_scene(&state.inner)?;
        Ok((
            PyDataFrame(scene.nodes_frame()?),
            PyDataFrame(scene.edges_frame()?),
        ))
    }

    fn graph_json(&self, state: &PyFilterState) -> PyResult<String> {
        to_json(&self.inner.graph_scene(&state.inner)?)
    }
}

/// Export column names as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let sighting = PyModule::new(m.py(), "sighting")?;
    for (name, value) in [
        ("DATE", schema::sighting::DATE),
        ("LOCATION", schema::sighting::LOCATION),
        ("INDIVIDUAL", schema::sighting::INDIVIDUAL),
        ("PARTICIPANTS", schema::sighting::PARTICIPANTS),
        ("GROUP", schema::sighting::GROUP),
        ("SEX", schema::sighting::SEX),
        ("STRANDS", schema::sighting::STRANDS),
        ("LATITUDE", schema::sighting::LATITUDE),
        ("LONGITUDE", schema::sighting::LONGITUDE),
        ("LINK", schema::sighting::LINK),
    ] {
        sighting.add(name, value)?;
    }
    m.add_submodule(&sighting)?;

    let catalog = PyModule::new(m.py(), "catalog")?;
    catalog.add("FILE_NAME", schema::catalog::FILE_NAME)?;
    catalog.add("COLUMNS", schema::catalog::ALL.to_vec())?;
    m.add_submodule(&catalog)?;

    Ok(())
}

#[pymodule]
#[pyo3(name = "_core")]
fn core_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyFilterState>()?;
    m.add_class::<PyDashboard>()?;
    add_schema_exports(m)?;
    Ok(())
}
