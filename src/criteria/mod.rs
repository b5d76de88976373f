pub mod parser;

use serde::{Deserialize, Serialize};

/// A single leaf predicate over a pair of assets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Criterion {
    FilenameSplit {
        #[serde(default)]
        delimiters: Vec<String>,
        #[serde(default)]
        index: usize,
    },
    FilenameRegex {
        pattern: String,
        #[serde(default)]
        index: usize,
        /// Tier-1 parent-selection rank group, if this leaf also drives
        /// `promote_index` ordering.
        #[serde(default)]
        promote_index: Option<usize>,
    },
    PathSplit {
        #[serde(default)]
        delimiters: Vec<String>,
        #[serde(default)]
        index: usize,
    },
    LocalDatetimeDelta {
        milliseconds: i64,
    },
    FlagEq {
        field: FlagField,
        value: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagField {
    IsArchived,
    IsTrashed,
}

/// The single internal representation every surface form normalizes to.
/// Clustering, bucket selection, and parent-tier detection all consult this
/// tree — never the JSON it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateNode {
    And(Vec<PredicateNode>),
    Or(Vec<PredicateNode>),
    Not(Vec<PredicateNode>),
    Leaf(Criterion),
}

impl PredicateNode {
    /// Default predicate when configuration is missing or empty: filename
    /// base match (ignoring extension) AND a 1s capture-time window.
    pub fn default_predicate() -> Self {
        PredicateNode::And(vec![
            PredicateNode::Leaf(Criterion::FilenameSplit {
                delimiters: vec!["~".to_string(), ".".to_string()],
                index: 0,
            }),
            PredicateNode::Leaf(Criterion::LocalDatetimeDelta { milliseconds: 1000 }),
        ])
    }

    /// Depth-first walk, used by the clusterer to find the first
    /// projection-forming leaf (filename/path split or regex) for bucketing.
    pub fn first_projection_leaf(&self) -> Option<&Criterion> {
        match self {
            PredicateNode::Leaf(c) => match c {
                Criterion::FilenameSplit { .. }
                | Criterion::FilenameRegex { .. }
                | Criterion::PathSplit { .. } => Some(c),
                _ => None,
            },
            PredicateNode::And(children) | PredicateNode::Or(children) | PredicateNode::Not(children) => {
                children.iter().find_map(|c| c.first_projection_leaf())
            }
        }
    }

    /// All leaves in the tree, depth-first, for evaluator projection caching
    /// and for parent-tier T1 (`promote_index`) detection.
    pub fn leaves(&self) -> Vec<&Criterion> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Criterion>) {
        match self {
            PredicateNode::Leaf(c) => out.push(c),
            PredicateNode::And(children) | PredicateNode::Or(children) | PredicateNode::Not(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CriteriaError {
    #[error("invalid criteria JSON at {pointer}: {message}")]
    Invalid { pointer: String, message: String },
    #[error("invalid regex in criterion at {pointer}: {source}")]
    InvalidRegex {
        pointer: String,
        #[source]
        source: regex::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_predicate_shape() {
        let p = PredicateNode::default_predicate();
        match p {
            PredicateNode::And(children) => assert_eq!(children.len(), 2),
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn test_first_projection_leaf_finds_filename_split() {
        let p = PredicateNode::default_predicate();
        let leaf = p.first_projection_leaf().expect("must find a leaf");
        assert!(matches!(leaf, Criterion::FilenameSplit { .. }));
    }

    #[test]
    fn test_first_projection_leaf_none_for_pure_time() {
        let p = PredicateNode::Leaf(Criterion::LocalDatetimeDelta { milliseconds: 500 });
        assert!(p.first_projection_leaf().is_none());
    }

    #[test]
    fn test_leaves_flattens_nested_tree() {
        let p = PredicateNode::Or(vec![
            PredicateNode::And(vec![
                PredicateNode::Leaf(Criterion::FlagEq {
                    field: FlagField::IsArchived,
                    value: false,
                }),
            ]),
            PredicateNode::Leaf(Criterion::LocalDatetimeDelta { milliseconds: 1 }),
        ]);
        assert_eq!(p.leaves().len(), 2);
    }
}
