//! 文档字段值的比较与文本化（term / match / range / terms 聚合共用）

use std::cmp::Ordering;

use serde_json::Value;

/// JSON 相等；两个数字按数值比较（`1 == 1.0`）
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_eq(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).map_or(false, |y| json_eq(x, y)))
        }
        _ => a == b,
    }
}

/// 字段的文本形式：字符串原样，null → ""，其余为紧凑 JSON
pub fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// "空"值：null、false、0、空串、空数组、空对象
pub fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// 按点分路径取嵌套字段；中途遇到非对象即视为缺失
pub fn lookup_path<'a>(source: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = source;
    for part in path.split('.') {
        cur = cur.as_object()?.get(part)?;
    }
    Some(cur)
}

fn type_rank(v: Option<&Value>) -> u8 {
    match v {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// 排序用的全序：缺失/null < bool < 数字 < 字符串 < 数组 < 对象
pub fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Array(xs)), Some(Value::Array(ys))) => {
            for (x, y) in xs.iter().zip(ys) {
                let ord = sort_cmp(Some(x), Some(y));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            xs.len().cmp(&ys.len())
        }
        (Some(Value::Object(_)), Some(Value::Object(_))) => Ordering::Equal,
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_compare_by_value() {
        assert!(json_eq(&json!(1), &json!(1.0)));
        assert!(json_eq(&json!({"a": [1, 2]}), &json!({"a": [1.0, 2]})));
        assert!(!json_eq(&json!("1"), &json!(1)));
    }

    #[test]
    fn text_and_blank() {
        assert_eq!(value_text(&json!("Ab")), "Ab");
        assert_eq!(value_text(&json!(null)), "");
        assert_eq!(value_text(&json!(10)), "10");
        assert_eq!(value_text(&json!(true)), "true");
        assert!(is_blank(&json!("")));
        assert!(is_blank(&json!({})));
        assert!(!is_blank(&json!(" ")));
    }

    #[test]
    fn nested_lookup() {
        let doc = json!({"meta": {"owner": {"name": "x"}}, "flat": 1});
        assert_eq!(lookup_path(&doc, "meta.owner.name"), Some(&json!("x")));
        assert_eq!(lookup_path(&doc, "flat.deeper"), None);
        assert_eq!(lookup_path(&doc, "missing"), None);
    }

    #[test]
    fn mixed_types_have_total_order() {
        assert_eq!(sort_cmp(None, Some(&json!(false))), Ordering::Less);
        assert_eq!(sort_cmp(Some(&json!(2)), Some(&json!("1"))), Ordering::Less);
        assert_eq!(sort_cmp(Some(&json!(2.5)), Some(&json!(10))), Ordering::Less);
        assert_eq!(sort_cmp(Some(&json!(null)), None), Ordering::Equal);
    }
}
