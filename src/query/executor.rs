use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::types::{Hit, Snapshot};
use crate::query::aggs::{self, parse_aggs, parse_source_fields, AggregationSpecs, Aggregations};
use crate::query::ast::Query;
use crate::query::sort::{parse_sort, sort_hits, SortSpec};

pub const DEFAULT_SIZE: usize = 10;

/// 解析后的搜索请求
#[derive(Clone, Debug, PartialEq)]
pub struct SearchRequest {
    pub query: Query,
    pub sort: Vec<SortSpec>,
    pub size: usize,
    pub source: Option<Vec<String>>,
    pub aggs: AggregationSpecs,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: Query::MatchAll,
            sort: Vec::new(),
            size: DEFAULT_SIZE,
            source: None,
            aggs: Vec::new(),
        }
    }
}

impl SearchRequest {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// `{query, sort, size, _source, aggs}`；缺失或形状不对的部分取默认值
    pub fn parse(body: &Value) -> Self {
        let field = |key: &str| body.get(key);
        Self {
            query: field("query").map_or(Query::MatchAll, Query::parse),
            sort: parse_sort(field("sort")),
            size: field("size")
                .and_then(Value::as_u64)
                .map_or(DEFAULT_SIZE, |n| n as usize),
            source: parse_source_fields(field("_source")),
            aggs: parse_aggs(field("aggs").or_else(|| field("aggregations"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Total {
    pub value: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Hits {
    pub hits: Vec<Hit>,
    pub total: Total,
}

/// `{hits: {hits, total: {value}}, aggregations?}`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchResponse {
    pub hits: Hits,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Aggregations>,
}

impl SearchResponse {
    pub fn total(&self) -> usize {
        self.hits.total.value
    }

    pub fn into_first_hit(self) -> Option<Hit> {
        self.hits.hits.into_iter().next()
    }
}

/// 严格按顺序求值：
/// 全量命中 → 谓词过滤 → 排序 → 截断到 size → `_source` 投影；
/// 聚合基于过滤并排序后、截断前的集合。
pub fn execute(snapshot: &Snapshot, request: &SearchRequest) -> SearchResponse {
    let all: Vec<Hit> = snapshot
        .iter()
        .map(|(id, source)| Hit::new(id.clone(), source.clone()))
        .collect();

    let mut filtered = request.query.filter(&all);
    sort_hits(&mut filtered, &request.sort);

    let mut page: Vec<Hit> = filtered.iter().take(request.size).cloned().collect();
    if let Some(fields) = &request.source {
        page = project_source(page, fields);
    }

    let aggregations = if request.aggs.is_empty() {
        None
    } else {
        Some(aggs::compute(&request.aggs, &filtered))
    };

    SearchResponse {
        hits: Hits {
            hits: page,
            total: Total {
                value: filtered.len(),
            },
        },
        aggregations: aggregations.filter(|a| !a.is_empty()),
    }
}

/// 只保留列出的顶层字段（按列出的顺序）
pub fn project_source(hits: Vec<Hit>, fields: &[String]) -> Vec<Hit> {
    hits.into_iter()
        .map(|hit| {
            let mut projected = Map::new();
            if let Value::Object(source) = &hit.source {
                for field in fields {
                    if let Some(v) = source.get(field) {
                        projected.insert(field.clone(), v.clone());
                    }
                }
            }
            Hit::new(hit.id, Value::Object(projected))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> Snapshot {
        json!({
            "1": {"status": "new", "amount": 10, "title": "first order"},
            "2": {"status": "done", "amount": 30, "title": "second order"},
            "3": {"status": "new", "amount": 20, "title": "third"},
            "4": {"status": "new", "amount": 5, "title": "fourth order"}
        })
        .as_object()
        .unwrap()
        .clone()
    }

    fn ids(resp: &SearchResponse) -> Vec<&str> {
        resp.hits.hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[test]
    fn default_request_returns_file_order() {
        let resp = execute(&snapshot(), &SearchRequest::parse(&json!({})));
        assert_eq!(ids(&resp), vec!["1", "2", "3", "4"]);
        assert_eq!(resp.total(), 4);
        assert!(resp.aggregations.is_none());
        assert!(serde_json::to_value(&resp).unwrap().get("aggregations").is_none());
    }

    #[test]
    fn filter_sort_truncate_project() {
        let req = SearchRequest::parse(&json!({
            "query": {"term": {"status": "new"}},
            "sort": [{"amount": {"order": "desc"}}],
            "size": 2,
            "_source": ["amount"]
        }));
        let resp = execute(&snapshot(), &req);
        assert_eq!(resp.total(), 3);
        assert_eq!(ids(&resp), vec!["3", "1"]);
        assert_eq!(resp.hits.hits[0].source, json!({"amount": 20}));
    }

    #[test]
    fn aggregations_see_untruncated_unprojected_set() {
        let req = SearchRequest::parse(&json!({
            "query": {"match": {"title": "order"}},
            "sort": [{"amount": {"order": "asc"}}],
            "size": 0,
            "_source": ["status"],
            "aggs": {
                "by_status": {"terms": {"field": "status"}},
                "top": {"top_hits": {"size": 2}}
            }
        }));
        let resp = execute(&snapshot(), &req);
        assert!(resp.hits.hits.is_empty());
        assert_eq!(resp.total(), 3);

        let aggs = resp.aggregations.as_ref().unwrap();
        let sum: usize = aggs["by_status"].buckets().unwrap().iter().map(|b| b.doc_count).sum();
        assert_eq!(sum, resp.total());

        let top = aggs["top"].top_hits().unwrap();
        assert_eq!(top[0].id, "4");
        assert_eq!(top[0].source["title"], json!("fourth order"));
        assert_eq!(top[1].id, "1");
    }

    #[test]
    fn unsupported_aggregations_are_omitted() {
        let req = SearchRequest::parse(&json!({"aggs": {"x": {"avg": {"field": "amount"}}}}));
        assert!(req.aggs.is_empty());
        assert!(execute(&snapshot(), &req).aggregations.is_none());
    }

    #[test]
    fn bad_size_falls_back_to_default() {
        assert_eq!(SearchRequest::parse(&json!({"size": -1})).size, DEFAULT_SIZE);
        assert_eq!(SearchRequest::parse(&json!({"size": "3"})).size, DEFAULT_SIZE);
        assert_eq!(SearchRequest::parse(&json!({"size": 3})).size, 3);
    }
}
