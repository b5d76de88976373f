use super::{Criterion, CriteriaError, PredicateNode};
use serde_json::Value;

/// Parse the `CRITERIA` configuration surface into the single
/// internal predicate tree. Accepts three JSON shapes:
///
/// 1. Legacy array: `[crit, crit, …]` → `And` of leaves.
/// 2. Groups form: `{"mode":"advanced","groups":[{"operator":"AND"|"OR","criteria":[…]}]}`.
/// 3. Expression form: `{"mode":"advanced","expression": node}`.
///
/// An empty string or `null` yields [`PredicateNode::default_predicate`].
pub fn parse_criteria(json: &str) -> Result<PredicateNode, CriteriaError> {
    let trimmed = json.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(PredicateNode::default_predicate());
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|e| CriteriaError::Invalid {
        pointer: "/".to_string(),
        message: e.to_string(),
    })?;

    parse_value(&value, "")
}

fn parse_value(value: &Value, pointer: &str) -> Result<PredicateNode, CriteriaError> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Ok(PredicateNode::default_predicate());
            }
            let leaves = items
                .iter()
                .enumerate()
                .map(|(i, item)| parse_criterion(item, &format!("{pointer}/{i}")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(PredicateNode::And(leaves.into_iter().map(PredicateNode::Leaf).collect()))
        }
        Value::Object(obj) => {
            if obj.contains_key("groups") {
                parse_groups_form(value, pointer)
            } else if obj.contains_key("expression") {
                let expr = value.get("expression").unwrap();
                parse_node(expr, &format!("{pointer}/expression"))
            } else {
                Err(CriteriaError::Invalid {
                    pointer: pointer.to_string(),
                    message: "expected legacy array, \"groups\", or \"expression\"".to_string(),
                })
            }
        }
        Value::Null => Ok(PredicateNode::default_predicate()),
        _ => Err(CriteriaError::Invalid {
            pointer: pointer.to_string(),
            message: "expected array or object at top level".to_string(),
        }),
    }
}

fn parse_groups_form(value: &Value, pointer: &str) -> Result<PredicateNode, CriteriaError> {
    let groups = value
        .get("groups")
        .and_then(Value::as_array)
        .ok_or_else(|| CriteriaError::Invalid {
            pointer: format!("{pointer}/groups"),
            message: "\"groups\" must be an array".to_string(),
        })?;

    let mut parsed_groups = Vec::with_capacity(groups.len());
    for (i, group) in groups.iter().enumerate() {
        let group_pointer = format!("{pointer}/groups/{i}");
        let operator = group
            .get("operator")
            .and_then(Value::as_str)
            .ok_or_else(|| CriteriaError::Invalid {
                pointer: format!("{group_pointer}/operator"),
                message: "missing \"operator\"".to_string(),
            })?;
        let criteria = group
            .get("criteria")
            .and_then(Value::as_array)
            .ok_or_else(|| CriteriaError::Invalid {
                pointer: format!("{group_pointer}/criteria"),
                message: "missing \"criteria\" array".to_string(),
            })?;
        let leaves = criteria
            .iter()
            .enumerate()
            .map(|(j, c)| parse_criterion(c, &format!("{group_pointer}/criteria/{j}")))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(PredicateNode::Leaf)
            .collect();
        parsed_groups.push(combine(operator, leaves, &group_pointer)?);
    }
    Ok(PredicateNode::Or(parsed_groups))
}

fn parse_node(value: &Value, pointer: &str) -> Result<PredicateNode, CriteriaError> {
    if let Some(criterion) = value.get("criteria") {
        return Ok(PredicateNode::Leaf(parse_criterion(
            criterion,
            &format!("{pointer}/criteria"),
        )?));
    }

    let operator = value
        .get("operator")
        .and_then(Value::as_str)
        .ok_or_else(|| CriteriaError::Invalid {
            pointer: format!("{pointer}/operator"),
            message: "node must have \"operator\" or \"criteria\"".to_string(),
        })?;
    let children = value
        .get("children")
        .and_then(Value::as_array)
        .ok_or_else(|| CriteriaError::Invalid {
            pointer: format!("{pointer}/children"),
            message: "missing \"children\" array".to_string(),
        })?;
    let parsed_children = children
        .iter()
        .enumerate()
        .map(|(i, c)| parse_node(c, &format!("{pointer}/children/{i}")))
        .collect::<Result<Vec<_>, _>>()?;
    combine(operator, parsed_children, pointer)
}

fn combine(
    operator: &str,
    children: Vec<PredicateNode>,
    pointer: &str,
) -> Result<PredicateNode, CriteriaError> {
    match operator.to_ascii_uppercase().as_str() {
        "AND" => Ok(PredicateNode::And(children)),
        "OR" => Ok(PredicateNode::Or(children)),
        "NOT" => Ok(PredicateNode::Not(children)),
        other => Err(CriteriaError::Invalid {
            pointer: pointer.to_string(),
            message: format!("unknown operator \"{other}\", expected AND/OR/NOT"),
        }),
    }
}

fn parse_criterion(value: &Value, pointer: &str) -> Result<Criterion, CriteriaError> {
    let criterion: Criterion =
        serde_json::from_value(value.clone()).map_err(|e| CriteriaError::Invalid {
            pointer: pointer.to_string(),
            message: e.to_string(),
        })?;
    if let Criterion::FilenameRegex { pattern, .. } = &criterion {
        regex::Regex::new(pattern).map_err(|e| CriteriaError::InvalidRegex {
            pointer: pointer.to_string(),
            source: e,
        })?;
    }
    Ok(criterion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::FlagField;

    #[test]
    fn test_missing_criteria_yields_default() {
        let p = parse_criteria("").unwrap();
        assert_eq!(p, PredicateNode::default_predicate());
    }

    #[test]
    fn test_null_yields_default() {
        let p = parse_criteria("null").unwrap();
        assert_eq!(p, PredicateNode::default_predicate());
    }

    #[test]
    fn test_legacy_array_form() {
        let json = r#"[
            {"type":"filename_split","delimiters":["~","."],"index":0},
            {"type":"local_datetime_delta","milliseconds":1000}
        ]"#;
        let p = parse_criteria(json).unwrap();
        match p {
            PredicateNode::And(children) => assert_eq!(children.len(), 2),
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn test_groups_form() {
        let json = r#"{
            "mode":"advanced",
            "groups":[
                {"operator":"AND","criteria":[{"type":"filename_split","delimiters":["~","."],"index":0}]},
                {"operator":"OR","criteria":[{"type":"flag_eq","field":"is_archived","value":false}]}
            ]
        }"#;
        let p = parse_criteria(json).unwrap();
        match p {
            PredicateNode::Or(groups) => {
                assert_eq!(groups.len(), 2);
                assert!(matches!(groups[0], PredicateNode::And(_)));
                assert!(matches!(groups[1], PredicateNode::Or(_)));
            }
            _ => panic!("expected Or of groups"),
        }
    }

    #[test]
    fn test_expression_form_not_negates_and() {
        let json = r#"{
            "mode":"advanced",
            "expression": {
                "operator":"NOT",
                "children":[
                    {"criteria":{"type":"flag_eq","field":"is_trashed","value":true}}
                ]
            }
        }"#;
        let p = parse_criteria(json).unwrap();
        match p {
            PredicateNode::Not(children) => {
                assert_eq!(children.len(), 1);
                match &children[0] {
                    PredicateNode::Leaf(Criterion::FlagEq { field, value }) => {
                        assert_eq!(*field, FlagField::IsTrashed);
                        assert!(*value);
                    }
                    other => panic!("unexpected child: {other:?}"),
                }
            }
            _ => panic!("expected Not"),
        }
    }

    #[test]
    fn test_expression_form_nested_and_or() {
        let json = r#"{
            "mode":"advanced",
            "expression": {
                "operator":"OR",
                "children":[
                    {"operator":"AND","children":[
                        {"criteria":{"type":"filename_split","delimiters":["~","."],"index":0}}
                    ]},
                    {"criteria":{"type":"local_datetime_delta","milliseconds":500}}
                ]
            }
        }"#;
        let p = parse_criteria(json).unwrap();
        match p {
            PredicateNode::Or(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[0], PredicateNode::And(_)));
                assert!(matches!(children[1], PredicateNode::Leaf(_)));
            }
            _ => panic!("expected Or"),
        }
    }

    #[test]
    fn test_round_trip_equivalent_trees_across_surface_forms() {
        // All three forms express "filename base match AND 1s time window";
        // each must decide the same equivalence for every asset pair.
        let legacy = parse_criteria(
            r#"[{"type":"filename_split","delimiters":["~","."],"index":0},
                {"type":"local_datetime_delta","milliseconds":1000}]"#,
        )
        .unwrap();
        let groups = parse_criteria(
            r#"{"mode":"advanced","groups":[{"operator":"AND","criteria":[
                {"type":"filename_split","delimiters":["~","."],"index":0},
                {"type":"local_datetime_delta","milliseconds":1000}
            ]}]}"#,
        )
        .unwrap();
        let expression = parse_criteria(
            r#"{"mode":"advanced","expression":{"operator":"AND","children":[
                {"criteria":{"type":"filename_split","delimiters":["~","."],"index":0}},
                {"criteria":{"type":"local_datetime_delta","milliseconds":1000}}
            ]}}"#,
        )
        .unwrap();

        use crate::evaluator::Evaluator;
        use crate::model::Asset;
        use chrono::{TimeZone, Utc};

        let mk = |id: &str, name: &str, secs: i64| Asset {
            id: id.to_string(),
            original_filename: name.to_string(),
            local_datetime: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::seconds(secs),
            original_path: format!("/{name}"),
            is_archived: false,
            is_trashed: false,
            stack_ref: None,
        };
        let a = mk("a", "IMG_1.jpg", 0);
        let b = mk("b", "IMG_1.CR2", 0);
        let c = mk("c", "IMG_2.jpg", 0);

        for tree in [&legacy, &groups, &expression] {
            let ev = Evaluator::new(tree);
            assert!(ev.equivalent(&a, &b), "a~b must hold for {tree:?}");
            assert!(!ev.equivalent(&a, &c), "a!~c must hold for {tree:?}");
        }
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let json = r#"[{"type":"filename_regex","pattern":"(unclosed","index":0}]"#;
        let err = parse_criteria(json).unwrap_err();
        assert!(matches!(err, CriteriaError::InvalidRegex { .. }));
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let json = r#"{"mode":"advanced","expression":{"operator":"XOR","children":[]}}"#;
        let err = parse_criteria(json).unwrap_err();
        assert!(matches!(err, CriteriaError::Invalid { .. }));
    }

    #[test]
    fn test_malformed_json_reports_pointer() {
        let err = parse_criteria("{not json").unwrap_err();
        match err {
            CriteriaError::Invalid { pointer, .. } => assert_eq!(pointer, "/"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
