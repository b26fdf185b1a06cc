use serde_json::Value;

use crate::core::types::Hit;
use crate::core::value::sort_cmp;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// 支持 `[{"f": {"order": "desc"}}]`、`[{"f": "desc"}]`、`["f"]`，以及单个对象
pub fn parse_sort(v: Option<&Value>) -> Vec<SortSpec> {
    match v {
        Some(Value::Array(items)) => items.iter().flat_map(parse_sort_item).collect(),
        Some(item @ (Value::Object(_) | Value::String(_))) => parse_sort_item(item),
        _ => Vec::new(),
    }
}

fn parse_sort_item(item: &Value) -> Vec<SortSpec> {
    match item {
        Value::String(field) => vec![SortSpec::asc(field.clone())],
        Value::Object(fields) => fields
            .iter()
            .map(|(field, order)| {
                let order = match order {
                    Value::Object(opts) => opts.get("order").and_then(Value::as_str),
                    Value::String(s) => Some(s.as_str()),
                    _ => None,
                };
                SortSpec {
                    field: field.clone(),
                    descending: order == Some("desc"),
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// 多键排序：从最后一个键开始逐个做稳定排序，第一个键最终占主导
pub fn sort_hits(hits: &mut [Hit], specs: &[SortSpec]) {
    for spec in specs.iter().rev() {
        hits.sort_by(|a, b| {
            let ord = sort_cmp(a.field(&spec.field), b.field(&spec.field));
            if spec.descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }
}
