use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{DashboardError, Result};
use crate::schema::sentinel;

/// Minimum co-occurrence weight for an edge to be drawn.
pub const DEFAULT_MIN_EDGE_WEIGHT: u32 = 2;
/// Seed for the spring layout's initial positions.
pub const LAYOUT_SEED: u64 = 42;
/// Optimal node distance of the spring layout.
pub const LAYOUT_K: f64 = 0.7;
pub const LAYOUT_ITERATIONS: usize = 50;

/// Top-level configuration. Every field has a default, so an empty YAML
/// document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// chrono formats tried in order when parsing `Fecha`.
    pub date_formats: Vec<String>,
    pub sentinels: Sentinels,
    pub graph: GraphConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            date_formats: vec![
                "%Y-%m-%d".to_string(),
                "%d/%m/%Y".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
            ],
            sentinels: Sentinels::default(),
            graph: GraphConfig::default(),
        }
    }
}

impl DashboardConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.graph.layout.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}

/// Fixed cell values with special meaning in `Sexo` and `Varadora`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Sentinels {
    pub female: String,
    pub male: String,
    pub strands_yes: String,
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            female: sentinel::FEMALE.to_string(),
            male: sentinel::MALE.to_string(),
            strands_yes: sentinel::STRANDS_YES.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub min_edge_weight: u32,
    /// Whether the sex and stranding selections also narrow the relation
    /// graph. Off by default: the graph reflects groups, individuals,
    /// locations and dates only.
    pub apply_sex_and_strands_filters: bool,
    pub layout: LayoutConfig,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            min_edge_weight: DEFAULT_MIN_EDGE_WEIGHT,
            apply_sex_and_strands_filters: false,
            layout: LayoutConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub seed: u64,
    pub k: f64,
    pub iterations: usize,
}

impl LayoutConfig {
    /// `k` divides every force, so it must be a positive finite number.
    pub fn validate(&self) -> Result<()> {
        if !(self.k.is_finite() && self.k > 0.0) {
            return Err(DashboardError::InvalidConfig(format!(
                "graph.layout.k must be positive, got {}",
                self.k
            )));
        }
        Ok(())
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            seed: LAYOUT_SEED,
            k: LAYOUT_K,
            iterations: LAYOUT_ITERATIONS,
        }
    }
}
