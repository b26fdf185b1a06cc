use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 单个文档：字段名 → 任意 JSON 值
pub type Document = Map<String, Value>;

/// 一个索引的完整内存快照：doc_id → 文档（保持文件中的顺序）
pub type Snapshot = Map<String, Value>;

/// 查询命中：`{_id, _source}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source")]
    pub source: Value,
}

impl Hit {
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }

    /// 顶层字段；`_source` 不是对象时视为没有任何字段
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.source.as_object().and_then(|m| m.get(name))
    }
}

/// 写入模式：整体替换 或 浅合并
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WriteMode {
    Replace,
    Merge,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Created,
    Updated,
    Deleted,
    NotFound,
}

/// 单文档写操作的返回值：`{_id, result}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    #[serde(rename = "_id")]
    pub id: String,
    pub result: WriteOutcome,
}

impl WriteResult {
    pub fn new(id: impl Into<String>, result: WriteOutcome) -> Self {
        Self {
            id: id.into(),
            result,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledged {
    pub acknowledged: bool,
}
