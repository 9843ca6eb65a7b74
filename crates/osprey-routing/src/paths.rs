//! All-pairs shortest paths over the switch graph.
//!
//! Classic Floyd–Warshall with a predecessor matrix for path
//! reconstruction. The node count is the switch count (tens, not
//! thousands), so the O(n³) pass per topology change is cheap.

use osprey_common::SwitchId;
use osprey_topology::TopologySnapshot;
use std::collections::HashMap;
use tracing::debug;

/// Sentinel distance for non-adjacent pairs, far beyond any feasible hop
/// count.
pub const INFINITE_DISTANCE: u32 = 10_000;

/// Shortest switch-id paths for every reachable ordered pair.
///
/// Unreachable pairs have no entry.
#[derive(Debug, Clone, Default)]
pub struct PathTable {
    paths: HashMap<(SwitchId, SwitchId), Vec<SwitchId>>,
}

impl PathTable {
    /// Compute all-pairs shortest paths from a topology snapshot.
    pub fn compute(snapshot: &TopologySnapshot) -> Self {
        let n = snapshot.switches.len();
        let mut dist = vec![vec![INFINITE_DISTANCE; n]; n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    dist[i][j] = 0;
                } else if snapshot.adjacency[i][j] != 0 {
                    dist[i][j] = 1;
                }
            }
        }

        let pred = floyd_warshall(&mut dist);

        let mut paths = HashMap::new();
        for i in 0..n {
            for j in 0..n {
                if dist[i][j] == INFINITE_DISTANCE {
                    continue;
                }
                let path: Vec<SwitchId> = reconstruct(i, j, &pred)
                    .into_iter()
                    .map(|index| snapshot.switches[index])
                    .collect();
                paths.insert((snapshot.switches[i], snapshot.switches[j]), path);
            }
        }
        debug!(switches = n, pairs = paths.len(), "path table computed");
        Self { paths }
    }

    /// Shortest path from `src` to `dst`, endpoints inclusive.
    pub fn path(&self, src: SwitchId, dst: SwitchId) -> Option<&[SwitchId]> {
        self.paths.get(&(src, dst)).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Relax `dist` in place and return the predecessor matrix.
///
/// `pred[i][j]` is the last intermediate node on the best known i→j path,
/// initialized to `i` (direct). Relaxation through a node with an infinite
/// leg is skipped so the sentinel never participates in a sum.
fn floyd_warshall(dist: &mut [Vec<u32>]) -> Vec<Vec<usize>> {
    let n = dist.len();
    let mut pred: Vec<Vec<usize>> = (0..n).map(|i| vec![i; n]).collect();
    for k in 0..n {
        for i in 0..n {
            for j in 0..n {
                if dist[i][k] == INFINITE_DISTANCE || dist[k][j] == INFINITE_DISTANCE {
                    continue;
                }
                if dist[i][k] + dist[k][j] < dist[i][j] {
                    dist[i][j] = dist[i][k] + dist[k][j];
                    pred[i][j] = pred[k][j];
                }
            }
        }
    }
    pred
}

/// Walk the predecessor matrix back from `dst` to `src`.
///
/// Only valid for finite-distance pairs; the all-pairs driver filters on
/// the distance matrix before calling.
fn reconstruct(src: usize, dst: usize, pred: &[Vec<usize>]) -> Vec<usize> {
    let mut path = vec![dst];
    let mut cursor = dst;
    loop {
        let via = pred[src][cursor];
        if via != cursor {
            path.push(via);
        }
        cursor = via;
        if via == src {
            break;
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn snapshot(switches: Vec<SwitchId>, edges: &[(usize, usize)]) -> TopologySnapshot {
        let n = switches.len();
        let mut adjacency = vec![vec![0u32; n]; n];
        for &(i, j) in edges {
            adjacency[i][j] = 1;
            adjacency[j][i] = 1;
        }
        TopologySnapshot {
            switches,
            adjacency,
            port_map: HashMap::new(),
            hosts: Vec::new(),
        }
    }

    #[test]
    fn test_line_paths() {
        // 1 - 2 - 3
        let table = PathTable::compute(&snapshot(vec![1, 2, 3], &[(0, 1), (1, 2)]));
        assert_eq!(table.path(1, 3), Some(&[1, 2, 3][..]));
        assert_eq!(table.path(1, 2), Some(&[1, 2][..]));
        assert_eq!(table.path(3, 1), Some(&[3, 2, 1][..]));
    }

    #[test]
    fn test_self_path_is_single_node() {
        let table = PathTable::compute(&snapshot(vec![7, 8], &[(0, 1)]));
        assert_eq!(table.path(7, 7), Some(&[7][..]));
    }

    #[test]
    fn test_unreachable_pair_has_no_entry() {
        let table = PathTable::compute(&snapshot(vec![1, 2, 3], &[(0, 1)]));
        assert_eq!(table.path(1, 3), None);
        assert_eq!(table.path(3, 2), None);
        // 2 nodes reachable both ways plus the three self paths, plus 3 alone
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn test_shortcut_wins_over_long_way() {
        // square with a diagonal: 0-1, 1-2, 2-3, 3-0, 0-2
        let table = PathTable::compute(&snapshot(
            vec![10, 11, 12, 13],
            &[(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)],
        ));
        assert_eq!(table.path(10, 12), Some(&[10, 12][..]));
        assert_eq!(table.path(11, 13).map(<[SwitchId]>::len), Some(3));
    }

    #[test]
    fn test_paths_are_valid_walks() {
        let snap = snapshot(vec![1, 2, 3, 4], &[(0, 1), (1, 2), (2, 3)]);
        let table = PathTable::compute(&snap);
        for (&(src, dst), path) in &table.paths {
            assert_eq!(*path.first().expect("empty path"), src);
            assert_eq!(*path.last().expect("empty path"), dst);
            for pair in path.windows(2) {
                let i = snap.switches.iter().position(|&s| s == pair[0]).unwrap();
                let j = snap.switches.iter().position(|&s| s == pair[1]).unwrap();
                assert_eq!(snap.adjacency[i][j], 1, "hop {pair:?} is not a link");
            }
        }
    }
}
