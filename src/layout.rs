//! Force-directed placement for the relation graph.
//!
//! Fruchterman-Reingold with weighted attraction: every pair of nodes
//! repels with `k² / d`, every edge attracts with `w · d² / k`. Start
//! positions are drawn from a seeded RNG and the step size cools linearly,
//! so identical graphs always get identical layouts.

use petgraph::graph::UnGraph;
use petgraph::visit::EdgeRef;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::LayoutConfig;

/// Distances are clamped to this to avoid blowing up on coincident nodes.
const MIN_DISTANCE: f64 = 0.01;
/// Stop early once the mean per-node step falls below this.
const CONVERGENCE_THRESHOLD: f64 = 1e-4;

/// Positions indexed by node index, rescaled into [-1, 1] around the
/// origin.
pub fn spring_layout<N>(graph: &UnGraph<N, u32>, config: &LayoutConfig) -> Vec<(f64, f64)> {
    let n = graph.node_count();
    match n {
        0 => return Vec::new(),
        1 => return vec![(0.0, 0.0)],
        _ => {}
    }

    let mut adjacency = vec![vec![0.0f64; n]; n];
    for edge in graph.edge_references() {
        let (a, b) = (edge.source().index(), edge.target().index());
        let w = f64::from(*edge.weight());
        adjacency[a][b] += w;
        adjacency[b][a] += w;
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut pos: Vec<[f64; 2]> = (0..n).map(|_| [rng.gen::<f64>(), rng.gen::<f64>()]).collect();

    let k = config.k;
    let mut t = span(&pos) * 0.1;
    let dt = t / (config.iterations as f64 + 1.0);

    for _ in 0..config.iterations {
        let mut displacement = vec![[0.0f64; 2]; n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let delta = [pos[i][0] - pos[j][0], pos[i][1] - pos[j][1]];
                let distance = norm(delta).max(MIN_DISTANCE);
                let force = k * k / (distance * distance) - adjacency[i][j] * distance / k;
                displacement[i][0] += delta[0] * force;
                displacement[i][1] += delta[1] * force;
            }
        }

        let mut step_sq = 0.0;
        for (p, d) in pos.iter_mut().zip(&displacement) {
            let mut length = norm(*d);
            if length < MIN_DISTANCE {
                length = 0.1;
            }
            let step = [d[0] * t / length, d[1] * t / length];
            p[0] += step[0];
            p[1] += step[1];
            step_sq += step[0] * step[0] + step[1] * step[1];
        }

        t -= dt;
        if step_sq.sqrt() / (n as f64) < CONVERGENCE_THRESHOLD {
            break;
        }
    }

    rescale(&mut pos);
    pos.into_iter().map(|[x, y]| (x, y)).collect()
}

fn norm(v: [f64; 2]) -> f64 {
    (v[0] * v[0] + v[1] * v[1]).sqrt()
}

/// Larger of the x and y extents.
fn span(pos: &[[f64; 2]]) -> f64 {
    let mut lo = [f64::INFINITY; 2];
    let mut hi = [f64::NEG_INFINITY; 2];
    for p in pos {
        for axis in 0..2 {
            lo[axis] = lo[axis].min(p[axis]);
            hi[axis] = hi[axis].max(p[axis]);
        }
    }
    (hi[0] - lo[0]).max(hi[1] - lo[1])
}

/// Centre on the origin and scale so the largest coordinate is 1.
fn rescale(pos: &mut [[f64; 2]]) {
    let n = pos.len() as f64;
    let mean = [
        pos.iter().map(|p| p[0]).sum::<f64>() / n,
        pos.iter().map(|p| p[1]).sum::<f64>() / n,
    ];
    let mut lim = 0.0f64;
    for p in pos.iter_mut() {
        p[0] -= mean[0];
        p[1] -= mean[1];
        lim = lim.max(p[0].abs()).max(p[1].abs());
    }
    if lim > 0.0 {
        for p in pos.iter_mut() {
            p[0] /= lim;
            p[1] /= lim;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_with_tail() -> UnGraph<&'static str, u32> {
        let mut g = UnGraph::new_undirected();
        let a = g.add_node("A");
        let b = g.add_node("B");
        let c = g.add_node("C");
        let d = g.add_node("D");
        g.add_edge(a, b, 3);
        g.add_edge(b, c, 2);
        g.add_edge(a, c, 2);
        g.add_edge(c, d, 5);
        g
    }

    fn dist(p: (f64, f64), q: (f64, f64)) -> f64 {
        ((p.0 - q.0).powi(2) + (p.1 - q.1).powi(2)).sqrt()
    }

    #[test]
    fn same_seed_same_layout() {
        let g = triangle_with_tail();
        let config = LayoutConfig::default();
        assert_eq!(spring_layout(&g, &config), spring_layout(&g, &config));
    }

    #[test]
    fn different_seed_different_layout() {
        let g = triangle_with_tail();
        let a = spring_layout(&g, &LayoutConfig::default());
        let b = spring_layout(
            &g,
            &LayoutConfig {
                seed: 7,
                ..LayoutConfig::default()
            },
        );
        assert_ne!(a, b);
    }

    #[test]
    fn positions_are_centred_and_within_unit_box() {
        let pos = spring_layout(&triangle_with_tail(), &LayoutConfig::default());
        assert_eq!(pos.len(), 4);
        assert!(pos.iter().all(|&(x, y)| x.abs() <= 1.0 + 1e-9 && y.abs() <= 1.0 + 1e-9));
        let max = pos
            .iter()
            .map(|&(x, y)| x.abs().max(y.abs()))
            .fold(0.0, f64::max);
        assert!((max - 1.0).abs() < 1e-9);
        let cx: f64 = pos.iter().map(|p| p.0).sum::<f64>() / 4.0;
        assert!(cx.abs() < 1e-9);
    }

    #[test]
    fn connected_nodes_end_up_closer_than_unconnected() {
        let mut g = UnGraph::<&str, u32>::new_undirected();
        let a = g.add_node("A");
        let b = g.add_node("B");
        let c = g.add_node("C");
        let d = g.add_node("D");
        g.add_edge(a, b, 10);
        g.add_edge(c, d, 10);
        let pos = spring_layout(&g, &LayoutConfig::default());
        assert!(dist(pos[0], pos[1]) < dist(pos[0], pos[2]));
        assert!(dist(pos[2], pos[3]) < dist(pos[1], pos[3]));
    }

    #[test]
    fn trivial_graphs() {
        let empty = UnGraph::<&str, u32>::new_undirected();
        assert!(spring_layout(&empty, &LayoutConfig::default()).is_empty());

        let mut single = UnGraph::<&str, u32>::new_undirected();
        single.add_node("A");
        assert_eq!(spring_layout(&single, &LayoutConfig::default()), vec![(0.0, 0.0)]);
    }
}
