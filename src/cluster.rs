use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PipelineError;

/// One agglomeration step. `left`/`right` are node ids: leaves are
/// `0..n`, the node created by merge `i` is `n + i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

/// Complete merge tree over `leaves` points, merges in ascending distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dendrogram {
    pub leaves: usize,
    pub merges: Vec<Merge>,
}

impl Dendrogram {
    fn root(&self) -> usize {
        if self.merges.is_empty() {
            0
        } else {
            self.leaves + self.merges.len() - 1
        }
    }

    /// Leaves under `node`, left subtree first.
    pub fn leaves_under(&self, node: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if id < self.leaves {
                out.push(id);
            } else {
                let merge = &self.merges[id - self.leaves];
                stack.push(merge.right);
                stack.push(merge.left);
            }
        }
        out
    }

    pub fn leaf_order(&self) -> Vec<usize> {
        if self.leaves == 0 {
            return Vec::new();
        }
        self.leaves_under(self.root())
    }

    /// Flat labels `1..=k` after applying the first `n - k` merges. Equal
    /// merge distances are resolved by merge order, so exactly `k` groups
    /// come out. Labels are numbered in dendrogram leaf order.
    pub fn cut(&self, k: usize) -> Vec<u32> {
        let n = self.leaves;
        if n == 0 {
            return Vec::new();
        }
        let k = k.clamp(1, n);
        let applied = n - k;
        let formed = |node: usize| node < n || node - n < applied;

        let mut labels = vec![0u32; n];
        let mut next = 0u32;
        let mut stack = vec![self.root()];
        while let Some(node) = stack.pop() {
            if formed(node) {
                next += 1;
                for leaf in self.leaves_under(node) {
                    labels[leaf] = next;
                }
            } else {
                let merge = &self.merges[node - n];
                stack.push(merge.right);
                stack.push(merge.left);
            }
        }
        labels
    }
}

/// Ward linkage over Euclidean distances, built with the nearest-neighbour
/// chain algorithm. Points must be finite.
pub fn ward_linkage(points: &[Vec<f64>]) -> Dendrogram {
    let n = points.len();
    if n < 2 {
        return Dendrogram {
            leaves: n,
            merges: Vec::new(),
        };
    }

    let mut dist = pairwise_distances(points);
    let mut size = vec![1usize; n];
    let mut chain: Vec<usize> = Vec::with_capacity(n);
    let mut merges = Vec::with_capacity(n - 1);

    for _ in 0..n - 1 {
        if chain.is_empty()
            && let Some(first) = size.iter().position(|s| *s > 0)
        {
            chain.push(first);
        }

        let (x, y, d) = loop {
            let x = chain[chain.len() - 1];
            let (mut y, mut current) = if chain.len() > 1 {
                let prev = chain[chain.len() - 2];
                (prev, dist[condensed(n, x, prev)])
            } else {
                (x, f64::INFINITY)
            };
            for i in 0..n {
                if size[i] == 0 || i == x {
                    continue;
                }
                let d = dist[condensed(n, x, i)];
                if d < current {
                    current = d;
                    y = i;
                }
            }
            if chain.len() > 1 && y == chain[chain.len() - 2] {
                break (x, y, current);
            }
            chain.push(y);
        };
        chain.truncate(chain.len() - 2);

        let (x, y) = if x < y { (x, y) } else { (y, x) };
        let (nx, ny) = (size[x], size[y]);
        merges.push(Merge {
            left: x,
            right: y,
            distance: d,
            size: nx + ny,
        });
        size[x] = 0;
        size[y] = nx + ny;

        for i in 0..n {
            let ni = size[i];
            if ni == 0 || i == y {
                continue;
            }
            let d_ix = dist[condensed(n, i, x)];
            let d_iy = dist[condensed(n, i, y)];
            dist[condensed(n, i, y)] = ward_distance(d_ix, d_iy, d, ni, nx, ny);
        }
    }

    // Stable, so equal distances keep construction order.
    merges.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    relabel(&mut merges, n);

    Dendrogram { leaves: n, merges }
}

pub fn cluster_points(
    points: &[Vec<f64>],
    k: usize,
) -> Result<(Dendrogram, Vec<u32>), PipelineError> {
    let distinct = distinct_count(points);
    if distinct < k {
        return Err(PipelineError::InsufficientDistinctPlayers {
            distinct,
            required: k,
        });
    }
    let tree = ward_linkage(points);
    let labels = tree.cut(k);
    debug!(points = points.len(), clusters = k, "cut ward dendrogram");
    Ok((tree, labels))
}

pub fn distinct_count(points: &[Vec<f64>]) -> usize {
    points
        .iter()
        .map(|row| {
            // -0.0 and 0.0 are the same profile.
            row.iter()
                .map(|v| if *v == 0.0 { 0u64 } else { v.to_bits() })
                .collect::<Vec<u64>>()
        })
        .collect::<HashSet<_>>()
        .len()
}

/// Mean silhouette coefficient. Singletons contribute 0. `None` unless the
/// label count lies in `2..=n-1`.
pub fn silhouette_score(points: &[Vec<f64>], labels: &[u32]) -> Option<f64> {
    let n = points.len();
    let mut sizes: BTreeMap<u32, usize> = BTreeMap::new();
    for label in labels {
        *sizes.entry(*label).or_insert(0) += 1;
    }
    let k = sizes.len();
    if n < 3 || k < 2 || k > n - 1 {
        return None;
    }

    let scores: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|i| {
            let own = labels[i];
            let own_size = sizes.get(&own).copied().unwrap_or(0);
            if own_size <= 1 {
                return 0.0;
            }
            let mut sums: BTreeMap<u32, f64> = BTreeMap::new();
            for j in 0..n {
                if i != j {
                    *sums.entry(labels[j]).or_insert(0.0) += euclidean(&points[i], &points[j]);
                }
            }
            let a = sums.get(&own).copied().unwrap_or(0.0) / (own_size - 1) as f64;
            let b = sums
                .iter()
                .filter(|(label, _)| **label != own)
                .map(|(label, sum)| sum / sizes[label] as f64)
                .fold(f64::INFINITY, f64::min);
            let denom = a.max(b);
            if denom > 0.0 { (b - a) / denom } else { 0.0 }
        })
        .collect();

    Some(scores.iter().sum::<f64>() / n as f64)
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

fn pairwise_distances(points: &[Vec<f64>]) -> Vec<f64> {
    let n = points.len();
    (0..n)
        .into_par_iter()
        .map(|i| {
            ((i + 1)..n)
                .map(|j| euclidean(&points[i], &points[j]))
                .collect::<Vec<f64>>()
        })
        .collect::<Vec<Vec<f64>>>()
        .concat()
}

fn condensed(n: usize, a: usize, b: usize) -> usize {
    let (i, j) = if a < b { (a, b) } else { (b, a) };
    n * i - i * (i + 1) / 2 + (j - i - 1)
}

// Lance-Williams update for Ward's method on Euclidean distances.
fn ward_distance(d_ix: f64, d_iy: f64, d_xy: f64, ni: usize, nx: usize, ny: usize) -> f64 {
    let (ni, nx, ny) = (ni as f64, nx as f64, ny as f64);
    let t = 1.0 / (ni + nx + ny);
    ((ni + nx) * t * d_ix * d_ix + (ni + ny) * t * d_iy * d_iy - ni * t * d_xy * d_xy)
        .max(0.0)
        .sqrt()
}

fn relabel(merges: &mut [Merge], n: usize) {
    let mut parent: Vec<usize> = (0..2 * n - 1).collect();
    let mut sizes = vec![1usize; 2 * n - 1];
    let mut next = n;
    for merge in merges.iter_mut() {
        let a = find(&mut parent, merge.left);
        let b = find(&mut parent, merge.right);
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        merge.left = lo;
        merge.right = hi;
        parent[a] = next;
        parent[b] = next;
        sizes[next] = sizes[a] + sizes[b];
        merge.size = sizes[next];
        next += 1;
    }
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    let mut root = x;
    while parent[root] != root {
        root = parent[root];
    }
    while parent[x] != root {
        let up = parent[x];
        parent[x] = root;
        x = up;
    }
    root
}
