//! Visual encoding of the relation graph.
//!
//! Turns a `CooccurrenceGraph` into everything a graph renderer needs:
//! - node positions from the spring layout
//! - node color by group, from a stable palette
//! - node size from the total weight of the node's edges
//! - edge width and opacity from the edge weight
//!
//! Drawing is left to the renderer; this module only computes values.

use std::collections::BTreeMap;

use polars::prelude::*;
use serde::Serialize;

use crate::config::LayoutConfig;
use crate::error::{EmptyResultWarning, Result};
use crate::graph::CooccurrenceGraph;
use crate::layout::spring_layout;
use crate::schema::graph as cols;

// ── Palette ─────────────────────────────────────────────────────────────────

/// Qualitative Set3 followed by Pastel.
const PALETTE: [(u8, u8, u8); 23] = [
    (141, 211, 199),
    (255, 255, 179),
    (190, 186, 218),
    (251, 128, 114),
    (128, 177, 211),
    (253, 180, 98),
    (179, 222, 105),
    (252, 205, 229),
    (217, 217, 217),
    (188, 128, 189),
    (204, 235, 197),
    (255, 237, 111),
    (102, 197, 204),
    (246, 207, 113),
    (248, 156, 116),
    (220, 176, 242),
    (135, 197, 95),
    (158, 185, 243),
    (254, 136, 177),
    (201, 219, 116),
    (139, 224, 164),
    (180, 151, 231),
    (179, 179, 179),
];

/// Color for individuals whose group is unknown.
pub const FALLBACK_COLOR: &str = "999999";

const BASE_NODE_SIZE: f64 = 100.0;
const NODE_SIZE_PER_WEIGHT: f64 = 30.0;
const MAX_NODE_SIZE: f64 = 1000.0;
const BASE_EDGE_WIDTH: f64 = 0.5;
const EDGE_WIDTH_PER_WEIGHT: f64 = 0.8;
const BASE_EDGE_OPACITY: f64 = 0.2;
const EDGE_OPACITY_RANGE: f64 = 0.5;

/// Hex color (no `#`) per group. Groups take palette slots in sorted
/// order, wrapping around when there are more groups than colors.
pub fn group_colors<'a, I>(groups: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a str>,
{
    let sorted: std::collections::BTreeSet<&str> = groups.into_iter().collect();
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, group)| {
            let (r, g, b) = PALETTE[i % PALETTE.len()];
            (group.to_string(), format!("{r:02x}{g:02x}{b:02x}"))
        })
        .collect()
}

pub fn node_size(total_weight: u32) -> f64 {
    (BASE_NODE_SIZE + NODE_SIZE_PER_WEIGHT * f64::from(total_weight)).min(MAX_NODE_SIZE)
}

pub fn edge_width(weight: u32) -> f64 {
    BASE_EDGE_WIDTH + EDGE_WIDTH_PER_WEIGHT * f64::from(weight)
}

/// Only meaningful when the graph has at least one edge, so `max_weight`
/// is positive.
pub fn edge_opacity(weight: u32, max_weight: u32) -> f64 {
    let ratio = f64::from(weight) / f64::from(max_weight);
    BASE_EDGE_OPACITY + EDGE_OPACITY_RANGE * ratio.min(1.0)
}

// ── Scene ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeVisual {
    pub name: String,
    pub group: String,
    pub color: String,
    pub size: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeVisual {
    pub source: String,
    pub target: String,
    pub weight: u32,
    pub width: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub group: String,
    pub color: String,
}

/// Everything the graph renderer draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphScene {
    pub nodes: Vec<NodeVisual>,
    pub edges: Vec<EdgeVisual>,
    pub legend: Vec<LegendEntry>,
    pub min_edge_weight: u32,
    pub warning: Option<EmptyResultWarning>,
}

impl GraphScene {
    pub fn from_graph(graph: &CooccurrenceGraph, layout: &LayoutConfig) -> Self {
        let colors = group_colors(graph.groups());
        let positions = spring_layout(graph.graph(), layout);

        let nodes = graph
            .nodes()
            .into_iter()
            .zip(positions)
            .map(|(name, (x, y))| {
                let group = graph.group(name);
                NodeVisual {
                    name: name.to_string(),
                    group: group.to_string(),
                    color: colors
                        .get(group)
                        .cloned()
                        .unwrap_or_else(|| FALLBACK_COLOR.to_string()),
                    size: node_size(graph.incident_weight(name)),
                    x,
                    y,
                }
            })
            .collect();

        // No edges, no max weight: opacity is never computed.
        let edges = match graph.max_weight() {
            Some(max_weight) => graph
                .edges()
                .into_iter()
                .map(|(source, target, weight)| EdgeVisual {
                    source: source.to_string(),
                    target: target.to_string(),
                    weight,
                    width: edge_width(weight),
                    opacity: edge_opacity(weight, max_weight),
                })
                .collect(),
            None => Vec::new(),
        };

        let legend = colors
            .into_iter()
            .map(|(group, color)| LegendEntry { group, color })
            .collect();

        Self {
            nodes,
            edges,
            legend,
            min_edge_weight: graph.min_weight(),
            warning: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes_frame(&self) -> Result<DataFrame> {
        let names: Vec<&str> = self.nodes.iter().map(|n| n.name.as_str()).collect();
        let groups: Vec<&str> = self.nodes.iter().map(|n| n.group.as_str()).collect();
        let colors: Vec<&str> = self.nodes.iter().map(|n| n.color.as_str()).collect();
        let sizes: Vec<f64> = self.nodes.iter().map(|n| n.size).collect();
        let xs: Vec<f64> = self.nodes.iter().map(|n| n.x).collect();
        let ys: Vec<f64> = self.nodes.iter().map(|n| n.y).collect();
        Ok(DataFrame::new(vec![
            Column::new(cols::NODE.into(), &names),
            Column::new(cols::GROUP.into(), &groups),
            Column::new(cols::COLOR.into(), &colors),
            Column::new(cols::SIZE.into(), &sizes),
            Column::new(cols::X.into(), &xs),
            Column::new(cols::Y.into(), &ys),
        ])?)
    }

    pub fn edges_frame(&self) -> Result<DataFrame> {
        let sources: Vec<&str> = self.edges.iter().map(|e| e.source.as_str()).collect();
        let targets: Vec<&str> = self.edges.iter().map(|e| e.target.as_str()).collect();
        let weights: Vec<u32> = self.edges.iter().map(|e| e.weight).collect();
        let widths: Vec<f64> = self.edges.iter().map(|e| e.width).collect();
        let opacities: Vec<f64> = self.edges.iter().map(|e| e.opacity).collect();
        Ok(DataFrame::new(vec![
            Column::new(cols::SOURCE.into(), &sources),
            Column::new(cols::TARGET.into(), &targets),
            Column::new(cols::WEIGHT.into(), &weights),
            Column::new(cols::WIDTH.into(), &widths),
            Column::new(cols::OPACITY.into(), &opacities),
        ])?)
    }
}
