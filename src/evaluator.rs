use crate::criteria::{Criterion, FlagField, PredicateNode};
use crate::model::Asset;
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;

/// Evaluates a predicate tree over asset pairs, memoizing the per-asset
/// projection of every projection-forming leaf so a clustering pass costs
/// O(N) projections rather than O(N²).
pub struct Evaluator<'a> {
    tree: &'a PredicateNode,
    projections: RefCell<HashMap<(Criterion, String), Option<String>>>,
    regexes: RefCell<HashMap<String, Regex>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(tree: &'a PredicateNode) -> Self {
        Self {
            tree,
            projections: RefCell::new(HashMap::new()),
            regexes: RefCell::new(HashMap::new()),
        }
    }

    /// Project a single asset under a projection-forming leaf, using the
    /// shared memo. Exposed so the clusterer can sort/bucket by the same
    /// projection it will later re-check pairwise.
    pub fn project(&self, criterion: &Criterion, asset: &Asset) -> Option<String> {
        self.project_cached(criterion, asset)
    }

    pub fn equivalent(&self, a: &Asset, b: &Asset) -> bool {
        self.eval_node(self.tree, a, b)
    }

    fn eval_node(&self, node: &PredicateNode, a: &Asset, b: &Asset) -> bool {
        match node {
            PredicateNode::Leaf(c) => self.eval_leaf(c, a, b),
            PredicateNode::And(children) => children.iter().all(|c| self.eval_node(c, a, b)),
            PredicateNode::Or(children) => children.iter().any(|c| self.eval_node(c, a, b)),
            PredicateNode::Not(children) => {
                !children.iter().all(|c| self.eval_node(c, a, b))
            }
        }
    }

    fn eval_leaf(&self, criterion: &Criterion, a: &Asset, b: &Asset) -> bool {
        match criterion {
            Criterion::LocalDatetimeDelta { milliseconds } => {
                let diff = (a.local_datetime - b.local_datetime).num_milliseconds().abs();
                diff <= *milliseconds
            }
            Criterion::FlagEq { field, value } => {
                flag_value(field, a) == *value && flag_value(field, b) == *value
            }
            Criterion::FilenameSplit { .. } | Criterion::PathSplit { .. } => {
                let pa = self.project_cached(criterion, a);
                let pb = self.project_cached(criterion, b);
                pa == pb
            }
            Criterion::FilenameRegex { .. } => {
                let pa = self.project_cached(criterion, a);
                let pb = self.project_cached(criterion, b);
                match (pa, pb) {
                    (Some(x), Some(y)) => x == y,
                    _ => false,
                }
            }
        }
    }

    fn project_cached(&self, criterion: &Criterion, asset: &Asset) -> Option<String> {
        let key = (criterion.clone(), asset.id.clone());
        if let Some(hit) = self.projections.borrow().get(&key) {
            return hit.clone();
        }
        let value = match criterion {
            Criterion::FilenameSplit { delimiters, index } => {
                Some(split_project(&asset.original_filename, delimiters, *index))
            }
            Criterion::PathSplit { delimiters, index } => {
                Some(split_project(&asset.original_path, delimiters, *index))
            }
            Criterion::FilenameRegex { pattern, index, .. } => {
                self.regex_project(&asset.original_filename, pattern, *index)
            }
            _ => None,
        };
        self.projections.borrow_mut().insert(key, value.clone());
        value
    }

    fn regex_project(&self, s: &str, pattern: &str, index: usize) -> Option<String> {
        if !self.regexes.borrow().contains_key(pattern) {
            // Validated at parse time (criteria::parser::parse_criterion); a
            // bad pattern here would be a programmer error, not config input.
            let re = Regex::new(pattern).expect("criterion regex validated at parse time");
            self.regexes.borrow_mut().insert(pattern.to_string(), re);
        }
        let regexes = self.regexes.borrow();
        let re = regexes.get(pattern).unwrap();
        let caps = re.captures(s)?;
        let group = if index < caps.len() { index } else { 0 };
        caps.get(group).map(|m| m.as_str().to_string())
    }
}

fn flag_value(field: &FlagField, asset: &Asset) -> bool {
    match field {
        FlagField::IsArchived => asset.is_archived,
        FlagField::IsTrashed => asset.is_trashed,
    }
}

/// Split `s` on any character in `delimiters`, drop empty pieces, and return
/// the piece at `index`. Empty `delimiters` or an out-of-range `index` both
/// fall back to the whole string.
fn split_project(s: &str, delimiters: &[String], index: usize) -> String {
    if delimiters.is_empty() {
        return s.to_string();
    }
    let pieces: Vec<&str> = s
        .split(|c: char| delimiters.iter().any(|d| d.contains(c)))
        .filter(|p| !p.is_empty())
        .collect();
    if pieces.is_empty() || index >= pieces.len() {
        return s.to_string();
    }
    pieces[index].to_string()
}
