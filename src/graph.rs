use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use tracing::info;

use crate::events::parse_participants;
use crate::model::SightingRecord;
use crate::schema::graph::UNKNOWN_GROUP;

/// Unordered pair of individuals, stored as (min, max).
pub type Pair = (String, String);

/// Weighted undirected graph of individuals seen together.
///
/// Nodes are individuals, edge weights count the distinct sightings in
/// which both took part. Only pairs reaching `min_weight` become edges, and
/// an individual is a node only if it has at least one such edge.
pub struct CooccurrenceGraph {
    graph: UnGraph<String, u32>,
    /// Map from individual name → NodeIndex for fast lookup.
    node_map: HashMap<String, NodeIndex>,
    /// Every pair weight, including those under the threshold.
    weights: BTreeMap<Pair, u32>,
    /// Group of each individual in the source rows (first row wins).
    group_of: BTreeMap<String, Option<String>>,
    min_weight: u32,
}

impl CooccurrenceGraph {
    /// Build the graph from filtered sighting rows.
    pub fn from_rows(rows: &[SightingRecord], min_weight: u32) -> Self {
        let known = known_individuals(rows);
        let group_of = group_of(rows);
        let weights = pair_weights(sighting_participants(rows), &known);
        let graph = Self::from_weights(weights, min_weight).with_groups(group_of);
        info!(
            "Relation graph: {} individuals, {} pairs, {} edges at weight >= {}",
            graph.node_count(),
            graph.weights.len(),
            graph.edge_count(),
            min_weight
        );
        graph
    }

    /// Build the thresholded graph from precomputed pair weights.
    pub fn from_weights(weights: BTreeMap<Pair, u32>, min_weight: u32) -> Self {
        let mut graph = UnGraph::new_undirected();
        let mut node_map: HashMap<String, NodeIndex> = HashMap::new();

        let get_or_insert = |map: &mut HashMap<String, NodeIndex>,
                             g: &mut UnGraph<String, u32>,
                             id: &str|
         -> NodeIndex {
            *map.entry(id.to_string())
                .or_insert_with(|| g.add_node(id.to_string()))
        };

        for ((a, b), &weight) in &weights {
            if weight < min_weight {
                continue;
            }
            let a_idx = get_or_insert(&mut node_map, &mut graph, a);
            let b_idx = get_or_insert(&mut node_map, &mut graph, b);
            graph.add_edge(a_idx, b_idx, weight);
        }

        Self {
            graph,
            node_map,
            weights,
            group_of: BTreeMap::new(),
            min_weight,
        }
    }

    pub fn with_groups(mut self, group_of: BTreeMap<String, Option<String>>) -> Self {
        self.group_of = group_of;
        self
    }

    pub fn graph(&self) -> &UnGraph<String, u32> {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn min_weight(&self) -> u32 {
        self.min_weight
    }

    /// Node names in index order.
    pub fn nodes(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].as_str())
            .collect()
    }

    /// Edges as (source, target, weight) in insertion order.
    pub fn edges(&self) -> Vec<(&str, &str, u32)> {
        self.graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].as_str(),
                    self.graph[e.target()].as_str(),
                    *e.weight(),
                )
            })
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node_map.contains_key(name)
    }

    /// Co-occurrence count of two individuals before thresholding. The
    /// argument order does not matter.
    pub fn weight(&self, a: &str, b: &str) -> u32 {
        let key = canonical_pair(a, b);
        self.weights.get(&key).copied().unwrap_or(0)
    }

    /// Every pair weight, including pairs under the threshold.
    pub fn pair_weights(&self) -> &BTreeMap<Pair, u32> {
        &self.weights
    }

    /// Sum of the weights of a node's edges in the graph.
    pub fn incident_weight(&self, name: &str) -> u32 {
        let Some(&idx) = self.node_map.get(name) else {
            return 0;
        };
        self.graph.edges(idx).map(|e| *e.weight()).sum()
    }

    pub fn max_weight(&self) -> Option<u32> {
        self.graph.edge_weights().copied().max()
    }

    /// Group label of an individual; `unknown` when missing.
    pub fn group(&self, name: &str) -> &str {
        self.group_of
            .get(name)
            .and_then(|g| g.as_deref())
            .unwrap_or(UNKNOWN_GROUP)
    }

    /// Sorted distinct groups of the source individuals.
    pub fn groups(&self) -> BTreeSet<&str> {
        self.group_of
            .values()
            .filter_map(|g| g.as_deref())
            .collect()
    }
}

/// Distinct primary individuals of the rows.
pub fn known_individuals(rows: &[SightingRecord]) -> HashSet<&str> {
    rows.iter()
        .filter_map(|r| r.individual.as_deref())
        .collect()
}

/// Group of each individual, taken from its first row.
pub fn group_of(rows: &[SightingRecord]) -> BTreeMap<String, Option<String>> {
    let mut out = BTreeMap::new();
    for row in rows {
        if let Some(name) = row.individual.as_deref() {
            out.entry(name.to_string())
                .or_insert_with(|| row.group.clone());
        }
    }
    out
}

/// Participant lists of the distinct (date, location, participants)
/// sightings, in first-seen order.
pub fn sighting_participants(rows: &[SightingRecord]) -> Vec<&str> {
    let mut seen: HashSet<(Option<NaiveDate>, Option<&str>, &str)> = HashSet::new();
    rows.iter()
        .filter_map(|r| {
            let present = r.individuals_present.as_deref()?;
            seen.insert((r.date, r.location.as_deref(), present))
                .then_some(present)
        })
        .collect()
}

/// Count, for every pair of known individuals, the sightings they share.
///
/// Names are intersected with `known` and deduplicated per sighting;
/// sightings with fewer than two remaining names contribute nothing.
pub fn pair_weights<'a, I>(participant_lists: I, known: &HashSet<&str>) -> BTreeMap<Pair, u32>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut weights: BTreeMap<Pair, u32> = BTreeMap::new();
    for list in participant_lists {
        let valid: BTreeSet<&str> = parse_participants(list)
            .into_iter()
            .filter(|name| known.contains(name))
            .collect();
        if valid.len() < 2 {
            continue;
        }
        // BTreeSet iterates sorted, so every pair comes out as (min, max).
        let names: Vec<&str> = valid.into_iter().collect();
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                *weights.entry((a.to_string(), b.to_string())).or_insert(0) += 1;
            }
        }
    }
    weights
}

fn canonical_pair(a: &str, b: &str) -> Pair {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
