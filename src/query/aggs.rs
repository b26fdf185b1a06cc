//! 聚合：terms / filter / top_hits，作用于过滤、排序后、分页前的命中集

use std::collections::HashMap;
use std::ops::Index;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::core::types::Hit;
use crate::core::value::{lookup_path, value_text};
use crate::query::ast::Query;
use crate::query::executor::project_source;
use crate::query::sort::{parse_sort, sort_hits, SortSpec};

const DEFAULT_TOP_HITS: usize = 1;

/// 聚合名 → 定义（保持请求中的顺序）
pub type AggregationSpecs = Vec<(String, Aggregation)>;

/// 聚合名 → 结果（按请求中的顺序输出）
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aggregations {
    entries: Vec<(String, AggregationResult)>,
}

impl Aggregations {
    pub fn get(&self, name: &str) -> Option<&AggregationResult> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, AggregationResult)> for Aggregations {
    fn from_iter<I: IntoIterator<Item = (String, AggregationResult)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Index<&str> for Aggregations {
    type Output = AggregationResult;

    fn index(&self, name: &str) -> &AggregationResult {
        match self.get(name) {
            Some(result) => result,
            None => panic!("no aggregation named {name:?}"),
        }
    }
}

impl Serialize for Aggregations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, result) in &self.entries {
            map.serialize_entry(name, result)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Aggregation {
    Terms {
        field: String,
        order: Option<BucketOrder>,
        sub: AggregationSpecs,
    },
    Filter {
        query: Query,
        sub: AggregationSpecs,
    },
    TopHits {
        size: usize,
        sort: Vec<SortSpec>,
        source: Option<Vec<String>>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BucketOrder {
    Count { descending: bool },
    Key { descending: bool },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Bucket {
    pub key: String,
    pub doc_count: usize,
    #[serde(flatten)]
    pub sub: Aggregations,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TopHits {
    pub hits: Vec<Hit>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggregationResult {
    Buckets {
        buckets: Vec<Bucket>,
    },
    Count {
        doc_count: usize,
        #[serde(flatten)]
        sub: Aggregations,
    },
    TopHits {
        hits: TopHits,
    },
}

impl AggregationResult {
    pub fn buckets(&self) -> Option<&[Bucket]> {
        match self {
            AggregationResult::Buckets { buckets } => Some(buckets),
            _ => None,
        }
    }

    pub fn doc_count(&self) -> Option<usize> {
        match self {
            AggregationResult::Count { doc_count, .. } => Some(*doc_count),
            _ => None,
        }
    }

    pub fn top_hits(&self) -> Option<&[Hit]> {
        match self {
            AggregationResult::TopHits { hits } => Some(&hits.hits),
            _ => None,
        }
    }
}

/// 解析 `aggs`；不支持的聚合类型直接跳过
pub fn parse_aggs(v: Option<&Value>) -> AggregationSpecs {
    let Some(defs) = v.and_then(Value::as_object) else {
        return Vec::new();
    };
    defs.iter()
        .filter_map(|(name, def)| Some((name.clone(), parse_aggregation(def)?)))
        .collect()
}

fn parse_aggregation(def: &Value) -> Option<Aggregation> {
    let def = def.as_object()?;
    let sub = || parse_aggs(def.get("aggs").or_else(|| def.get("aggregations")));

    if let Some(terms) = def.get("terms") {
        let field = terms.get("field")?.as_str()?.to_string();
        return Some(Aggregation::Terms {
            field,
            order: terms.get("order").and_then(parse_bucket_order),
            sub: sub(),
        });
    }
    if let Some(filter) = def.get("filter") {
        return Some(Aggregation::Filter {
            query: Query::parse(filter),
            sub: sub(),
        });
    }
    if let Some(top) = def.get("top_hits") {
        return Some(Aggregation::TopHits {
            size: top
                .get("size")
                .and_then(Value::as_u64)
                .map_or(DEFAULT_TOP_HITS, |n| n as usize),
            sort: parse_sort(top.get("sort")),
            source: parse_source_fields(top.get("_source")),
        });
    }
    None
}

fn parse_bucket_order(v: &Value) -> Option<BucketOrder> {
    let (by, dir) = v.as_object()?.iter().next()?;
    let descending = dir.as_str() == Some("desc");
    match by.as_str() {
        "_count" => Some(BucketOrder::Count { descending }),
        "_key" => Some(BucketOrder::Key { descending }),
        _ => None,
    }
}

/// `_source: ["a", "b"]`；空列表或其他形状视为不投影
pub fn parse_source_fields(v: Option<&Value>) -> Option<Vec<String>> {
    let fields: Vec<String> = v?
        .as_array()?
        .iter()
        .filter_map(|f| f.as_str().map(str::to_string))
        .collect();
    (!fields.is_empty()).then_some(fields)
}

/// 对命中集计算全部聚合
pub fn compute(specs: &AggregationSpecs, hits: &[Hit]) -> Aggregations {
    specs
        .iter()
        .map(|(name, agg)| (name.clone(), agg.compute(hits)))
        .collect()
}

impl Aggregation {
    pub fn compute(&self, hits: &[Hit]) -> AggregationResult {
        match self {
            Aggregation::Terms { field, order, sub } => AggregationResult::Buckets {
                buckets: terms_buckets(hits, field, *order, sub),
            },
            Aggregation::Filter { query, sub } => {
                let matched = query.filter(hits);
                AggregationResult::Count {
                    doc_count: matched.len(),
                    sub: compute(sub, &matched),
                }
            }
            Aggregation::TopHits { size, sort, source } => {
                let mut top = hits.to_vec();
                sort_hits(&mut top, sort);
                top.truncate(*size);
                if let Some(fields) = source {
                    top = project_source(top, fields);
                }
                AggregationResult::TopHits {
                    hits: TopHits { hits: top },
                }
            }
        }
    }
}

/// 按字段字符串值分桶；缺失 / null 归入 ""，桶内计数之和等于命中总数
fn terms_buckets(
    hits: &[Hit],
    field: &str,
    order: Option<BucketOrder>,
    sub: &AggregationSpecs,
) -> Vec<Bucket> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<Hit>)> = Vec::new();
    for hit in hits {
        let key = lookup_path(&hit.source, field)
            .map(value_text)
            .unwrap_or_default();
        match slots.get(&key) {
            Some(&i) => groups[i].1.push(hit.clone()),
            None => {
                slots.insert(key.clone(), groups.len());
                groups.push((key, vec![hit.clone()]));
            }
        }
    }

    let mut buckets: Vec<Bucket> = groups
        .into_iter()
        .map(|(key, members)| Bucket {
            doc_count: members.len(),
            sub: compute(sub, &members),
            key,
        })
        .collect();

    match order {
        Some(BucketOrder::Count { descending }) => buckets.sort_by(|a, b| {
            let ord = a.doc_count.cmp(&b.doc_count);
            if descending { ord.reverse() } else { ord }
        }),
        Some(BucketOrder::Key { descending }) => buckets.sort_by(|a, b| {
            let ord = a.key.cmp(&b.key);
            if descending { ord.reverse() } else { ord }
        }),
        None => {}
    }
    buckets
}
