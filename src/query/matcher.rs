use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::core::types::Hit;
use crate::core::value::{json_eq, value_text};
use crate::query::ast::{Operator, Query, RangeField, RangeOp};

/// 时间戳格式：带 / 不带小数秒（如 "2025-12-30 18:19:38.050895"）
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

impl Query {
    /// 单文档求值；缺失字段按 null 处理
    pub fn matches(&self, hit: &Hit) -> bool {
        match self {
            Query::MatchAll => true,
            Query::Term { field, value } => {
                if field == "_id" {
                    return value.as_str() == Some(hit.id.as_str());
                }
                json_eq(hit.field(field).unwrap_or(&Value::Null), value)
            }
            Query::Terms { field, values } => {
                let actual = hit.field(field).unwrap_or(&Value::Null);
                values.iter().any(|v| json_eq(actual, v))
            }
            Query::Match {
                field,
                text,
                operator,
            } => {
                let haystack = hit.field(field).map(value_text).unwrap_or_default().to_lowercase();
                let mut tokens = text.split_whitespace();
                match operator {
                    Operator::And => tokens.all(|t| haystack.contains(t)),
                    Operator::Or => tokens.any(|t| haystack.contains(t)),
                }
            }
            Query::Bool { must, filter } => must.iter().chain(filter).all(|q| q.matches(hit)),
            Query::Range(fields) => fields.iter().all(|r| r.holds(hit)),
        }
    }

    /// 过滤候选集，保持原有顺序
    pub fn filter(&self, hits: &[Hit]) -> Vec<Hit> {
        hits.iter().filter(|h| self.matches(h)).cloned().collect()
    }
}

impl RangeField {
    fn holds(&self, hit: &Hit) -> bool {
        let actual = hit.field(&self.field).map(value_text).unwrap_or_default();
        self.bounds
            .iter()
            .all(|(op, threshold)| range_op_holds(*op, &actual, &value_text(threshold)))
    }
}

/// 两边都能解析成时间戳则按时间比较，否则退回字符串比较。
///
/// 数字也走字符串比较（"10" < "9"），与既有行为保持一致。
pub fn compare_for_range(actual: &str, threshold: &str) -> Ordering {
    match (parse_timestamp(actual), parse_timestamp(threshold)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => actual.cmp(threshold),
    }
}

fn range_op_holds(op: RangeOp, actual: &str, threshold: &str) -> bool {
    let ord = compare_for_range(actual, threshold);
    match op {
        RangeOp::Gte => ord != Ordering::Less,
        RangeOp::Lte => ord != Ordering::Greater,
        RangeOp::Gt => ord == Ordering::Greater,
        RangeOp::Lt => ord == Ordering::Less,
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(id: &str, source: Value) -> Hit {
        Hit::new(id, source)
    }

    fn q(v: Value) -> Query {
        Query::parse(&v)
    }

    #[test]
    fn term_on_id_and_fields() {
        let h = hit("42", json!({"status": "new", "n": 1}));
        assert!(q(json!({"term": {"_id": "42"}})).matches(&h));
        assert!(!q(json!({"term": {"_id": "4"}})).matches(&h));
        assert!(q(json!({"term": {"n": 1.0}})).matches(&h));
        assert!(!q(json!({"term": {"status": "New"}})).matches(&h));
        // 缺失字段等于 null
        assert!(q(json!({"term": {"missing": null}})).matches(&h));
    }

    #[test]
    fn terms_membership() {
        let h = hit("1", json!({"status": "done"}));
        assert!(q(json!({"terms": {"status": ["new", "done"]}})).matches(&h));
        assert!(!q(json!({"terms": {"status": ["new"]}})).matches(&h));
    }

    #[test]
    fn match_operator_semantics() {
        let only_a = hit("1", json!({"f": "Alpha only"}));
        let both = hit("2", json!({"f": "alpha and Beta"}));
        let and = q(json!({"match": {"f": {"query": "ALPHA beta", "operator": "and"}}}));
        let or = q(json!({"match": {"f": "alpha beta"}}));
        assert!(!and.matches(&only_a));
        assert!(and.matches(&both));
        assert!(or.matches(&only_a));
        assert!(!or.matches(&hit("3", json!({"f": "gamma"}))));
        // 子串匹配，数字字段按文本
        assert!(q(json!({"match": {"code": "23"}})).matches(&hit("4", json!({"code": 1234}))));
    }

    #[test]
    fn bool_requires_all_clauses() {
        let query = q(json!({"bool": {"must": [
            {"term": {"status": "x"}},
            {"term": {"k": "v"}}
        ]}}));
        assert!(query.matches(&hit("1", json!({"status": "x", "k": "v"}))));
        assert!(!query.matches(&hit("2", json!({"status": "x", "k": "w"}))));
        assert!(!query.matches(&hit("3", json!({"status": "y", "k": "v"}))));

        let with_filter = q(json!({"bool": {
            "must": [{"term": {"status": "x"}}],
            "filter": [{"term": {"k": "v"}}]
        }}));
        assert!(!with_filter.matches(&hit("2", json!({"status": "x", "k": "w"}))));
    }

    #[test]
    fn range_on_timestamps_is_inclusive_exclusive() {
        let h = hit("1", json!({"t": "2025-12-30 18:19:38.050895"}));
        let at = "2025-12-30 18:19:38.050895";
        assert!(q(json!({"range": {"t": {"gte": at}}})).matches(&h));
        assert!(q(json!({"range": {"t": {"lte": at}}})).matches(&h));
        assert!(!q(json!({"range": {"t": {"gt": at}}})).matches(&h));
        assert!(!q(json!({"range": {"t": {"lt": at}}})).matches(&h));

        // 与不带小数秒的阈值按时间比较
        let window = json!({"gt": "2025-12-30 18:19:38", "lt": "2025-12-31 00:00:00"});
        assert!(q(json!({"range": {"t": window}})).matches(&h));
        assert!(!q(json!({"range": {"t": {"lt": "2025-12-30 18:19:38"}}})).matches(&h));
    }

    #[test]
    fn range_falls_back_to_string_compare() {
        let h = hit("1", json!({"grade": "b"}));
        assert!(q(json!({"range": {"grade": {"gte": "b", "lte": "b"}}})).matches(&h));
        assert!(!q(json!({"range": {"grade": {"gt": "b"}}})).matches(&h));
        assert!(!q(json!({"range": {"grade": {"lt": "b"}}})).matches(&h));
        assert!(q(json!({"range": {"grade": {"gt": "a", "lt": "c"}}})).matches(&h));

        // 数字按字符串比较："10" < "9"
        assert!(q(json!({"range": {"n": {"lt": 9}}})).matches(&hit("2", json!({"n": 10}))));
        assert_eq!(compare_for_range("10", "9"), Ordering::Less);
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("2025-12-30 18:19:38").is_some());
        assert!(parse_timestamp("2025-12-30 18:19:38.5").is_some());
        assert!(parse_timestamp("2025-12-30T18:19:38").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
