use crate::criteria::{Criterion, PredicateNode};
use crate::model::Asset;
use regex::Regex;

/// Tokens consulted by tiers T2–T4 of the parent-selection comparator.
/// Defaults match the documented built-ins.
#[derive(Debug, Clone)]
pub struct ParentSelectionConfig {
    pub filename_promote: Vec<String>,
    pub ext_promote: Vec<String>,
}

impl Default for ParentSelectionConfig {
    fn default() -> Self {
        Self {
            filename_promote: split_csv("cover,edit,crop,hdr,biggestNumber"),
            ext_promote: split_csv(".jpg,.png,.jpeg,.heic,.dng"),
        }
    }
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',').map(|t| t.to_string()).collect()
}

/// Reorder `cluster` in place so index 0 is the parent, via a six-tier
/// comparator. Every tie-break is total: the final tier is a case-sensitive
/// filename compare, so no two distinct assets can tie all the way through.
pub fn order_cluster(cluster: &mut [Asset], tree: &PredicateNode, config: &ParentSelectionConfig) {
    let split_delims = split_delimiters_for_biggest_number(tree);
    let promote_leaf = promote_index_leaf(tree);
    let auto_sequence = is_auto_sequence(&config.filename_promote);

    cluster.sort_by(|a, b| {
        let ka = asset_key(
            a,
            &promote_leaf,
            &config.filename_promote,
            auto_sequence,
            &config.ext_promote,
            &split_delims,
        );
        let kb = asset_key(
            b,
            &promote_leaf,
            &config.filename_promote,
            auto_sequence,
            &config.ext_promote,
            &split_delims,
        );
        ka.cmp(&kb)
    });
}

type AssetKey = (i64, usize, i128, i128, usize, u8, String);

#[allow(clippy::too_many_arguments)]
fn asset_key(
    asset: &Asset,
    promote_leaf: &Option<(Regex, usize)>,
    filename_promote: &[String],
    auto_sequence: bool,
    ext_promote: &[String],
    split_delims: &[String],
) -> AssetKey {
    (
        tier1_promote_index(asset, promote_leaf),
        tier2_rank(asset, filename_promote, auto_sequence).0,
        tier2_rank(asset, filename_promote, auto_sequence).1,
        tier3_biggest_number(asset, filename_promote, split_delims),
        tier4_ext_promote(asset, ext_promote),
        tier5_builtin_ext(asset),
        asset.original_filename.clone(),
    )
}

/// T1: regex `promote_index` rank, if the tree names one. Lower wins; a
/// non-matching/unparseable asset sorts last within this tier.
fn tier1_promote_index(asset: &Asset, promote_leaf: &Option<(Regex, usize)>) -> i64 {
    let Some((re, group)) = promote_leaf else {
        return 0;
    };
    re.captures(&asset.original_filename)
        .and_then(|caps| {
            let idx = if *group < caps.len() { *group } else { 0 };
            caps.get(idx)
        })
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .unwrap_or(i64::MAX)
}

fn promote_index_leaf(tree: &PredicateNode) -> Option<(Regex, usize)> {
    tree.leaves().into_iter().find_map(|leaf| match leaf {
        Criterion::FilenameRegex {
            pattern,
            promote_index: Some(group),
            ..
        } => Regex::new(pattern).ok().map(|re| (re, *group)),
        _ => None,
    })
}

/// T2: filename-promote rank. Returns `(rank, sequence_tiebreak)`; the
/// tiebreak only carries meaning among entries that matched the same
/// `sequence`-kind token or an auto-detected numeric list.
fn tier2_rank(asset: &Asset, tokens: &[String], auto_sequence: bool) -> (usize, i128) {
    let filename = &asset.original_filename;
    let lower = filename.to_lowercase();

    if auto_sequence {
        return match first_digit_run_value(filename) {
            Some(v) => (0, v),
            None => (1, i128::MAX),
        };
    }

    for (idx, token) in tokens.iter().enumerate() {
        if token.is_empty() {
            let later_literal_tokens: Vec<&str> = tokens[idx + 1..]
                .iter()
                .filter(|t| !t.is_empty() && t.as_str() != "biggestNumber" && !is_sequence_token(t))
                .map(|s| s.as_str())
                .collect();
            let none_match = later_literal_tokens
                .iter()
                .all(|t| !lower.contains(&t.to_lowercase()));
            if none_match {
                return (idx, i128::MAX);
            }
            continue;
        }
        if token == "biggestNumber" {
            // Matches unconditionally; the real tie-break is T3.
            return (idx, i128::MAX);
        }
        if is_sequence_token(token) {
            let constraint = parse_sequence_constraint(token);
            if let Some(v) = sequence_match(filename, &constraint) {
                return (idx, v);
            }
            continue;
        }
        if lower.contains(&token.to_lowercase()) {
            return (idx, i128::MAX);
        }
    }
    (tokens.len(), i128::MAX)
}

fn is_sequence_token(token: &str) -> bool {
    let lower = token.to_lowercase();
    lower == "sequence" || lower.starts_with("sequence:")
}

enum SequenceConstraint {
    None,
    ExactLen(usize),
    Prefix(String),
}

fn parse_sequence_constraint(token: &str) -> SequenceConstraint {
    match token.split_once(':') {
        None => SequenceConstraint::None,
        Some((_, suffix)) => match suffix.parse::<usize>() {
            Ok(n) => SequenceConstraint::ExactLen(n),
            Err(_) => SequenceConstraint::Prefix(suffix.to_string()),
        },
    }
}

fn sequence_match(filename: &str, constraint: &SequenceConstraint) -> Option<i128> {
    match constraint {
        SequenceConstraint::None => first_digit_run_value(filename),
        SequenceConstraint::ExactLen(n) => find_digit_run_with_len(filename, *n),
        SequenceConstraint::Prefix(p) => {
            if filename.starts_with(p.as_str()) {
                first_digit_run_value(filename)
            } else {
                None
            }
        }
    }
}

fn first_digit_run(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            return Some(&s[start..i]);
        }
        i += 1;
    }
    None
}

fn first_digit_run_value(s: &str) -> Option<i128> {
    first_digit_run(s).and_then(|r| r.parse::<i128>().ok())
}

fn find_digit_run_with_len(s: &str, n: usize) -> Option<i128> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == n {
                return s[start..i].parse::<i128>().ok();
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Auto-detect a `sequence` rule when the whole filename-promote list is
/// pure numeric tokens.
fn is_auto_sequence(tokens: &[String]) -> bool {
    !tokens.is_empty()
        && tokens
            .iter()
            .all(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()))
}

/// T3: biggestNumber tie-break. Inert (constant) unless `biggestNumber` is
/// actually present in the configured list.
fn tier3_biggest_number(asset: &Asset, tokens: &[String], split_delims: &[String]) -> i128 {
    if !tokens.iter().any(|t| t == "biggestNumber") {
        return 0;
    }
    match biggest_number_suffix(&asset.original_filename, split_delims) {
        Some(v) => -v,
        None => i128::MAX,
    }
}

/// The numeric suffix immediately after one of the configured split
/// delimiters: split the filename on those delimiters and take the
/// rightmost fully-numeric piece among everything after the first piece
/// (the first piece is never "immediately after" a delimiter).
fn biggest_number_suffix(filename: &str, delims: &[String]) -> Option<i128> {
    if delims.is_empty() {
        return None;
    }
    let pieces: Vec<&str> = filename
        .split(|c: char| delims.iter().any(|d| d.contains(c)))
        .collect();
    pieces
        .iter()
        .skip(1)
        .rev()
        .find(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
        .and_then(|p| p.parse::<i128>().ok())
}

fn split_delimiters_for_biggest_number(tree: &PredicateNode) -> Vec<String> {
    tree.leaves()
        .into_iter()
        .find_map(|leaf| match leaf {
            Criterion::FilenameSplit { delimiters, .. } => Some(delimiters.clone()),
            _ => None,
        })
        .unwrap_or_else(|| vec!["~".to_string(), ".".to_string()])
}

/// T4: extension-promote rank (case-insensitive, leading dot optional in config).
fn tier4_ext_promote(asset: &Asset, ext_promote: &[String]) -> usize {
    let lower = asset.original_filename.to_lowercase();
    for (idx, ext) in ext_promote.iter().enumerate() {
        let mut normalized = ext.to_lowercase();
        if !normalized.starts_with('.') {
            normalized.insert(0, '.');
        }
        if lower.ends_with(&normalized) {
            return idx;
        }
    }
    ext_promote.len()
}

/// T5: built-in extension rank — `.jpeg` > `.jpg` > `.png` > everything else.
fn tier5_builtin_ext(asset: &Asset) -> u8 {
    let lower = asset.original_filename.to_lowercase();
    if lower.ends_with(".jpeg") {
        0
    } else if lower.ends_with(".jpg") {
        1
    } else if lower.ends_with(".png") {
        2
    } else {
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn asset(id: &str, filename: &str) -> Asset {
        Asset {
            id: id.to_string(),
            original_filename: filename.to_string(),
            local_datetime: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            original_path: format!("/{filename}"),
            is_archived: false,
            is_trashed: false,
            stack_ref: None,
        }
    }

    fn default_tree() -> PredicateNode {
        PredicateNode::default_predicate()
    }

    #[test]
    fn test_scenario_1_jpg_beats_raw_via_t4_t5() {
        let mut cluster = vec![asset("raw", "IMG_1234.CR2"), asset("jpg", "IMG_1234.jpg")];
        order_cluster(&mut cluster, &default_tree(), &ParentSelectionConfig::default());
        assert_eq!(cluster[0].id, "jpg");
    }

    #[test]
    fn test_scenario_2_empty_token_negative_match() {
        let tree = default_tree();
        let config = ParentSelectionConfig {
            filename_promote: split_csv(",night,cover,edit,crop,hdr,biggestNumber"),
            ..ParentSelectionConfig::default()
        };
        let mut cluster = vec![
            asset("night", "PXL_20260120_120000000.NIGHT.jpg"),
            asset("dng", "PXL_20260120_120000000.dng"),
            asset("plain", "PXL_20260120_120000000.jpg"),
        ];
        order_cluster(&mut cluster, &tree, &config);
        assert_eq!(cluster[0].id, "plain", "plain .jpg wins the empty-token tier then T4/T5 over .dng");
    }

    #[test]
    fn test_scenario_3_biggest_number_via_t3() {
        let tree = PredicateNode::Leaf(Criterion::FilenameSplit {
            delimiters: vec!["-".to_string(), "~".to_string(), ".".to_string()],
            index: 0,
        });
        let config = ParentSelectionConfig::default();
        let mut cluster = vec![
            asset("base_arw", "ABC001.ARW"),
            asset("base_jpeg", "ABC001.JPEG"),
            asset("minus1", "ABC001-1.JPEG"),
            asset("minus2", "ABC001-2.JPEG"),
        ];
        order_cluster(&mut cluster, &tree, &config);
        assert_eq!(cluster[0].id, "minus2");
    }

    #[test]
    fn test_scenario_4_cover_beats_sequence() {
        let tree = PredicateNode::And(vec![
            PredicateNode::Leaf(Criterion::FilenameRegex {
                pattern: r"BURST(\d+)".to_string(),
                index: 1,
                promote_index: None,
            }),
            PredicateNode::Leaf(Criterion::LocalDatetimeDelta { milliseconds: 1000 }),
        ]);
        let config = ParentSelectionConfig {
            filename_promote: split_csv("cover,sequence"),
            ..ParentSelectionConfig::default()
        };
        let mut cluster = vec![
            asset("f1", "BURST20180828114700954.jpg"),
            asset("f2", "BURST20180828114700955.jpg"),
            asset("cover", "BURST20180828114700954_COVER.jpg"),
            asset("f3", "BURST20180828114700956.jpg"),
        ];
        order_cluster(&mut cluster, &tree, &config);
        assert_eq!(cluster[0].id, "cover");
    }

    #[test]
    fn test_auto_sequence_detection_extends_beyond_listed_values() {
        let config = ParentSelectionConfig {
            filename_promote: split_csv("0000,0001,0002"),
            ..ParentSelectionConfig::default()
        };
        let mut cluster = vec![asset("hi", "IMG_0003.jpg"), asset("lo", "IMG_0000.jpg")];
        order_cluster(&mut cluster, &default_tree(), &config);
        assert_eq!(cluster[0].id, "lo", "lower numeric value wins under auto-detected sequence");
    }

    #[test]
    fn test_tier6_is_total_tiebreak() {
        let mut cluster = vec![asset("b", "b.jpg"), asset("a", "a.jpg")];
        order_cluster(&mut cluster, &default_tree(), &ParentSelectionConfig::default());
        assert_eq!(cluster[0].id, "a");
    }

    #[test]
    fn test_determinism_i2() {
        let tree = default_tree();
        let config = ParentSelectionConfig::default();
        let make = || vec![asset("a", "z.jpg"), asset("b", "a.CR2"), asset("c", "m.jpg")];
        let mut c1 = make();
        let mut c2 = make();
        order_cluster(&mut c1, &tree, &config);
        order_cluster(&mut c2, &tree, &config);
        let ids1: Vec<&str> = c1.iter().map(|a| a.id.as_str()).collect();
        let ids2: Vec<&str> = c2.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids1, ids2);
    }

    #[test]
    fn test_biggest_number_inert_when_not_configured() {
        let tree = PredicateNode::Leaf(Criterion::FilenameSplit {
            delimiters: vec!["-".to_string()],
            index: 0,
        });
        let config = ParentSelectionConfig {
            filename_promote: split_csv("cover"),
            ..ParentSelectionConfig::default()
        };
        // Neither contains "cover"; tier3 must be inert (no biggestNumber
        // configured) so the fall-through goes straight to T4/T5/T6.
        let mut cluster = vec![asset("hi", "x-9.jpg"), asset("lo", "x-1.jpg")];
        order_cluster(&mut cluster, &tree, &config);
        // Same extension, so T6 filename compare decides: "x-1" < "x-9".
        assert_eq!(cluster[0].id, "lo");
    }
}
