use serde_json::{Map, Value};

use crate::core::value::{is_blank, value_text};

/// 查询谓词树（一次解析，逐文档求值）
///
/// 不认识或形状不对的子句一律解析为 `MatchAll`：宽松透传，不报错。
#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    MatchAll,
    /// 精确相等；字段 `_id` 比较文档 id
    Term { field: String, value: Value },
    /// 成员判断
    Terms { field: String, values: Vec<Value> },
    /// 小写化后按空白切词，逐词做子串匹配；`text` 已小写
    Match {
        field: String,
        text: String,
        operator: Operator,
    },
    /// must 与 filter 语义相同：全部满足
    Bool { must: Vec<Query>, filter: Vec<Query> },
    Range(Vec<RangeField>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RangeOp {
    Gte,
    Lte,
    Gt,
    Lt,
}

impl RangeOp {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "gte" => Some(RangeOp::Gte),
            "lte" => Some(RangeOp::Lte),
            "gt" => Some(RangeOp::Gt),
            "lt" => Some(RangeOp::Lt),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RangeField {
    pub field: String,
    pub bounds: Vec<(RangeOp, Value)>,
}

impl Query {
    pub fn term(field: impl Into<String>, value: Value) -> Self {
        Query::Term {
            field: field.into(),
            value,
        }
    }

    /// 解析 JSON 形式的查询子句。
    ///
    /// 同一对象里出现多个子句 key 时，按 match → term → terms → bool → range 取第一个。
    pub fn parse(v: &Value) -> Self {
        let Some(obj) = v.as_object() else {
            return Query::MatchAll;
        };
        if let Some(body) = obj.get("match") {
            return parse_match(body);
        }
        if let Some(body) = obj.get("term") {
            return parse_term(body);
        }
        if let Some(body) = obj.get("terms") {
            return parse_terms(body);
        }
        if let Some(body) = obj.get("bool") {
            return parse_bool(body);
        }
        if let Some(body) = obj.get("range") {
            return parse_range(body);
        }
        Query::MatchAll
    }
}

fn first_entry(body: &Value) -> Option<(&String, &Value)> {
    body.as_object().and_then(|m| m.iter().next())
}

fn parse_term(body: &Value) -> Query {
    match first_entry(body) {
        Some((field, value)) => Query::term(field.clone(), value.clone()),
        None => Query::MatchAll,
    }
}

fn parse_terms(body: &Value) -> Query {
    match first_entry(body) {
        Some((field, Value::Array(values))) => Query::Terms {
            field: field.clone(),
            values: values.clone(),
        },
        _ => Query::MatchAll,
    }
}

/// `{field: "text"}` 或 `{field: {query, operator}}`；多个字段时最后一个生效
fn parse_match(body: &Value) -> Query {
    let Some(entries) = body.as_object() else {
        return Query::MatchAll;
    };

    let mut picked: Option<(&String, Value, Operator)> = None;
    for (field, spec) in entries {
        picked = Some(match spec {
            Value::Object(opts) => {
                let query = opts.get("query").cloned().unwrap_or(Value::Null);
                let operator = match opts.get("operator").and_then(Value::as_str) {
                    Some(op) if op.eq_ignore_ascii_case("and") => Operator::And,
                    _ => Operator::Or,
                };
                (field, query, operator)
            }
            other => (field, other.clone(), Operator::Or),
        });
    }

    match picked {
        Some((field, query, operator)) if !field.is_empty() && !is_blank(&query) => {
            Query::Match {
                field: field.clone(),
                text: value_text(&query).to_lowercase(),
                operator,
            }
        }
        _ => Query::MatchAll,
    }
}

fn parse_bool(body: &Value) -> Query {
    let Some(obj) = body.as_object() else {
        return Query::MatchAll;
    };
    Query::Bool {
        must: parse_clauses(obj, "must"),
        filter: parse_clauses(obj, "filter"),
    }
}

fn parse_clauses(obj: &Map<String, Value>, key: &str) -> Vec<Query> {
    match obj.get(key) {
        Some(Value::Array(items)) => items.iter().map(Query::parse).collect(),
        Some(single @ Value::Object(_)) => vec![Query::parse(single)],
        _ => Vec::new(),
    }
}

fn parse_range(body: &Value) -> Query {
    let Some(fields) = body.as_object() else {
        return Query::MatchAll;
    };
    let ranges = fields
        .iter()
        .filter_map(|(field, params)| {
            let params = params.as_object()?;
            let bounds = params
                .iter()
                .filter_map(|(op, threshold)| Some((RangeOp::from_key(op)?, threshold.clone())))
                .collect();
            Some(RangeField {
                field: field.clone(),
                bounds,
            })
        })
        .collect();
    Query::Range(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_and_unknown_clauses_match_all() {
        assert_eq!(Query::parse(&json!(null)), Query::MatchAll);
        assert_eq!(Query::parse(&json!({})), Query::MatchAll);
        assert_eq!(Query::parse(&json!({"match_all": {}})), Query::MatchAll);
        assert_eq!(Query::parse(&json!({"wildcard": {"f": "a*"}})), Query::MatchAll);
        assert_eq!(Query::parse(&json!({"term": {}})), Query::MatchAll);
        assert_eq!(Query::parse(&json!({"terms": {"f": "x"}})), Query::MatchAll);
        assert_eq!(Query::parse(&json!({"match": {"f": ""}})), Query::MatchAll);
    }

    #[test]
    fn match_forms() {
        assert_eq!(
            Query::parse(&json!({"match": {"title": "Hello World"}})),
            Query::Match {
                field: "title".into(),
                text: "hello world".into(),
                operator: Operator::Or,
            }
        );
        assert_eq!(
            Query::parse(&json!({"match": {"title": {"query": "A b", "operator": "and"}}})),
            Query::Match {
                field: "title".into(),
                text: "a b".into(),
                operator: Operator::And,
            }
        );
    }

    #[test]
    fn clause_priority_prefers_match() {
        let q = Query::parse(&json!({"term": {"a": 1}, "match": {"b": "x"}}));
        assert!(matches!(q, Query::Match { .. }));
    }

    #[test]
    fn bool_accepts_object_or_array() {
        let q = Query::parse(&json!({"bool": {
            "must": {"term": {"a": 1}},
            "filter": [{"term": {"b": 2}}, {"range": {"t": {"gte": "x", "nope": 1}}}]
        }}));
        match q {
            Query::Bool { must, filter } => {
                assert_eq!(must, vec![Query::term("a", json!(1))]);
                assert_eq!(filter.len(), 2);
                assert_eq!(
                    filter[1],
                    Query::Range(vec![RangeField {
                        field: "t".into(),
                        bounds: vec![(RangeOp::Gte, json!("x"))],
                    }])
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
