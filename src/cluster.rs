use crate::criteria::{Criterion, PredicateNode};
use crate::evaluator::Evaluator;
use crate::model::Asset;

/// Disjoint-set forest over asset indices, path-compressed and union-by-rank.
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Partition `assets` into clusters under `tree` using union-find over a
/// projection-bucketed pairwise scan. Transitive closure over
/// `LocalDatetimeDelta` falls out of union-find for free: if `a~b` and `b~c`
/// are both discovered, they land in the same set even though the raw
/// predicate may not consider `a~c` directly equivalent.
pub fn cluster(assets: Vec<Asset>, tree: &PredicateNode) -> Vec<Vec<Asset>> {
    let n = assets.len();
    if n == 0 {
        return Vec::new();
    }

    let evaluator = Evaluator::new(tree);
    let primary_leaf = tree.first_projection_leaf().cloned();

    let mut order: Vec<usize> = (0..n).collect();
    match &primary_leaf {
        Some(leaf) => {
            order.sort_by(|&i, &j| {
                let pi = projection_key(&evaluator, leaf, &assets[i]);
                let pj = projection_key(&evaluator, leaf, &assets[j]);
                pi.cmp(&pj).then(i.cmp(&j))
            });
        }
        None => {
            order.sort_by(|&i, &j| {
                assets[i]
                    .local_datetime
                    .cmp(&assets[j].local_datetime)
                    .then(i.cmp(&j))
            });
        }
    }

    let mut dsu = DisjointSet::new(n);

    match &primary_leaf {
        Some(leaf) => {
            // Bucketed scan: the inner loop only compares assets sharing the
            // same primary projection, keeping the pass O(N) overall for
            // filename-dominated configs.
            let mut start = 0;
            while start < n {
                let key = projection_key(&evaluator, leaf, &assets[order[start]]);
                let mut end = start + 1;
                while end < n && projection_key(&evaluator, leaf, &assets[order[end]]) == key {
                    end += 1;
                }
                for oi in start..end {
                    for oj in (oi + 1)..end {
                        let (i, j) = (order[oi], order[oj]);
                        if evaluator.equivalent(&assets[i], &assets[j]) {
                            dsu.union(i, j);
                        }
                    }
                }
                start = end;
            }
        }
        None => {
            // No bucket-forming leaf (pure time predicate): documented O(N²)
            // fallback.
            for oi in 0..n {
                for oj in (oi + 1)..n {
                    let (i, j) = (order[oi], order[oj]);
                    if evaluator.equivalent(&assets[i], &assets[j]) {
                        dsu.union(i, j);
                    }
                }
            }
        }
    }

    group_by_root(assets, &mut dsu, &order)
}

/// Projection used purely for bucketing; `None` (no leaf) sorts assets
/// untouched relative to each other within this key, so callers must only
/// invoke this when `primary_leaf` is `Some`.
fn projection_key(evaluator: &Evaluator, leaf: &Criterion, asset: &Asset) -> String {
    evaluator
        .project(leaf, asset)
        .unwrap_or_else(|| asset.original_filename.clone())
}

fn group_by_root(assets: Vec<Asset>, dsu: &mut DisjointSet, order: &[usize]) -> Vec<Vec<Asset>> {
    let n = assets.len();
    let roots: Vec<usize> = (0..n).map(|i| dsu.find(i)).collect();

    // Preserve input order within a cluster, and order clusters by their
    // first member's position in the bucket scan.
    let mut first_seen_at: Vec<Option<usize>> = vec![None; n];
    for (pos, &idx) in order.iter().enumerate() {
        let root = roots[idx];
        if first_seen_at[root].is_none() {
            first_seen_at[root] = Some(pos);
        }
    }

    let mut by_root: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
    for i in 0..n {
        by_root.entry(roots[i]).or_default().push(i);
    }

    let mut cluster_roots: Vec<usize> = by_root.keys().copied().collect();
    cluster_roots.sort_by_key(|r| first_seen_at[*r].unwrap_or(usize::MAX));

    let mut assets: Vec<Option<Asset>> = assets.into_iter().map(Some).collect();
    let mut clusters = Vec::with_capacity(cluster_roots.len());
    for root in cluster_roots {
        let mut members = by_root.remove(&root).unwrap();
        members.sort();
        let cluster = members
            .into_iter()
            .map(|i| assets[i].take().expect("each index consumed exactly once"))
            .collect();
        clusters.push(cluster);
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::Criterion;
    use chrono::{TimeZone, Utc};

    fn asset(id: &str, filename: &str, secs: i64) -> Asset {
        Asset {
            id: id.to_string(),
            original_filename: filename.to_string(),
            local_datetime: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::seconds(secs),
            original_path: format!("/{filename}"),
            is_archived: false,
            is_trashed: false,
            stack_ref: None,
        }
    }

    #[test]
    fn test_empty_asset_list_yields_empty_plan() {
        let tree = PredicateNode::default_predicate();
        assert!(cluster(vec![], &tree).is_empty());
    }

    #[test]
    fn test_single_asset_yields_one_singleton_cluster() {
        let tree = PredicateNode::default_predicate();
        let clusters = cluster(vec![asset("a", "IMG_1.jpg", 0)], &tree);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 1);
    }

    #[test]
    fn test_scenario_1_raw_jpeg_pair() {
        let tree = PredicateNode::default_predicate();
        let assets = vec![
            asset("a", "IMG_1234.jpg", 0),
            asset("b", "IMG_1234.CR2", 0),
        ];
        let clusters = cluster(assets, &tree);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 2);
    }

    #[test]
    fn test_scenario_5_just_past_delta_stays_separate() {
        let tree = PredicateNode::And(vec![
            PredicateNode::Leaf(Criterion::FilenameSplit {
                delimiters: vec!["~".to_string(), ".".to_string()],
                index: 0,
            }),
            PredicateNode::Leaf(Criterion::LocalDatetimeDelta { milliseconds: 1000 }),
        ]);
        let assets = vec![asset("a", "IMG_1.jpg", 0), asset("b", "IMG_1.jpg", 2)];
        let clusters = cluster(assets, &tree);
        assert_eq!(clusters.len(), 2, "2s apart under a 1s delta must stay separate");
    }

    #[test]
    fn test_time_delta_transitivity_i5() {
        // a~b (1s gap), b~c (1s gap), a!~c directly (2s gap) under a 1.5s delta:
        // union-find must still place all three in one cluster.
        let tree = PredicateNode::Leaf(Criterion::LocalDatetimeDelta { milliseconds: 1500 });
        let assets = vec![
            asset("a", "x", 0),
            asset("b", "x", 1),
            asset("c", "x", 2),
        ];
        let clusters = cluster(assets, &tree);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 3);
    }

    #[test]
    fn test_disjoint_clusters_cover_every_asset_exactly_once_i1() {
        let tree = PredicateNode::default_predicate();
        let assets = vec![
            asset("a", "IMG_1.jpg", 0),
            asset("b", "IMG_1.CR2", 0),
            asset("c", "IMG_2.jpg", 100),
            asset("d", "IMG_3.jpg", 200),
        ];
        let total = assets.len();
        let clusters = cluster(assets, &tree);
        let covered: usize = clusters.iter().map(|c| c.len()).sum();
        assert_eq!(covered, total);
        let mut ids: Vec<&str> = clusters
            .iter()
            .flat_map(|c| c.iter().map(|a| a.id.as_str()))
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total, "every asset must appear in exactly one cluster");
    }

    #[test]
    fn test_pure_time_predicate_with_no_bucket_leaf() {
        let tree = PredicateNode::Leaf(Criterion::LocalDatetimeDelta { milliseconds: 500 });
        let assets = vec![asset("a", "a.jpg", 0), asset("b", "z.jpg", 0)];
        let clusters = cluster(assets, &tree);
        assert_eq!(clusters.len(), 1);
    }

    #[test]
    fn test_determinism_across_repeated_runs_i2() {
        let tree = PredicateNode::default_predicate();
        let make = || {
            vec![
                asset("a", "IMG_1.jpg", 0),
                asset("b", "IMG_1.CR2", 0),
                asset("c", "IMG_2.jpg", 0),
            ]
        };
        let run1: Vec<Vec<String>> = cluster(make(), &tree)
            .into_iter()
            .map(|c| c.into_iter().map(|a| a.id).collect())
            .collect();
        let run2: Vec<Vec<String>> = cluster(make(), &tree)
            .into_iter()
            .map(|c| c.into_iter().map(|a| a.id).collect())
            .collect();
        assert_eq!(run1, run2);
    }
}
