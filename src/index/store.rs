use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use serde_json::{Map, Value};
use tokio::fs;

use crate::core::config::StoreConfig;
use crate::core::error::{Result, StoreError};
use crate::core::types::{
    Acknowledged, Document, Hit, Snapshot, WriteMode, WriteOutcome, WriteResult,
};
use crate::core::value::{is_blank, json_eq};
use crate::index::locks::LockTable;
use crate::query::{execute, Query, SearchRequest, SearchResponse};
use crate::storage::encoding::resolve_fallback;
use crate::storage::{IndexPaths, Loaded};

/// 本地文件版文档存储
///
/// 每个索引一个 JSON 文件，整快照读、整快照原子写。
///
/// ## 并发契约
/// - 写操作（index / update / delete / update_by_field / create_index）在整个
///   读 → 改 → 备份 → 写 期间持有该索引的锁，同一索引上的写严格串行。
/// - 读操作（search / exists / get / get_by_field）不加锁，看到的是读取那一刻
///   磁盘上的快照，可能与进行中的写交错（弱一致，已知且接受）。
///
/// ## 损坏处理
/// 写路径读到损坏文件时先用 `.bak` 恢复一次；仍损坏则改名为 `.corrupt`
/// 并以空索引继续（数据丢失事件，error 级日志）。读路径把损坏视为空索引。
pub struct LocalStore {
    root: PathBuf,
    fallback: &'static Encoding,
    locks: LockTable,
}

impl LocalStore {
    /// 打开（必要时创建）存储根目录
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let fallback = resolve_fallback(config.fallback_encoding.as_deref())?;
        std::fs::create_dir_all(&config.data_dir)?;
        tracing::debug!(
            "Local store at {:?}, fallback encoding {}",
            config.data_dir,
            fallback.name()
        );
        Ok(Self {
            root: config.data_dir.clone(),
            fallback,
            locks: LockTable::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self, index: &str) -> Result<IndexPaths> {
        IndexPaths::resolve(&self.root, index)
    }

    // ------------------------------------------------------------------
    // 索引生命周期
    // ------------------------------------------------------------------

    /// mapping 总是覆盖写；文档文件只在不存在时创建，已有数据绝不清空。
    /// 数据文件缺失但 `.bak` 仍在（上次写入中断）时先恢复备份。
    pub async fn create_index(&self, index: &str, mapping: &Value) -> Result<Acknowledged> {
        let paths = self.paths(index)?;
        if is_blank(mapping) {
            return Err(StoreError::validation("mapping must not be empty"));
        }
        if !mapping.is_object() {
            return Err(StoreError::validation("mapping must be a JSON object"));
        }

        let _guard = self.locks.acquire(index).await;
        paths.mapping_file().write(mapping).await?;

        let data = paths.data_file();
        if !data.exists().await? && !self.restore_interrupted(index, &paths).await? {
            data.write(&Snapshot::new()).await?;
            tracing::info!("Index {} created at {:?}", index, paths.data);
        }
        Ok(Acknowledged { acknowledged: true })
    }

    /// 只看数据文件是否存在
    pub async fn index_exists(&self, index: &str) -> Result<bool> {
        self.paths(index)?.data_file().exists().await
    }

    pub async fn get_mapping(&self, index: &str) -> Result<Option<Value>> {
        let paths = self.paths(index)?;
        let loaded = paths.mapping_file().read(self.fallback).await?;
        Ok(match loaded {
            Loaded::Ready(m) | Loaded::Legacy { snapshot: m, .. } => Some(Value::Object(m)),
            Loaded::Missing | Loaded::Corrupt => None,
        })
    }

    // ------------------------------------------------------------------
    // 单文档写
    // ------------------------------------------------------------------

    /// 整体替换写入
    pub async fn index(&self, index: &str, doc_id: &str, body: Document) -> Result<WriteResult> {
        self.insert(index, doc_id, body, WriteMode::Replace).await
    }

    /// 浅合并到已有文档（不存在则视为空文档）
    pub async fn update(&self, index: &str, doc_id: &str, body: Document) -> Result<WriteResult> {
        self.insert(index, doc_id, body, WriteMode::Merge).await
    }

    pub async fn insert(
        &self,
        index: &str,
        doc_id: &str,
        body: Document,
        mode: WriteMode,
    ) -> Result<WriteResult> {
        let paths = self.paths(index)?;
        let _guard = self.locks.acquire(index).await;

        let mut snapshot = self.load_for_write(index, &paths).await?;
        match mode {
            WriteMode::Replace => {
                snapshot.insert(doc_id.to_string(), Value::Object(body));
            }
            WriteMode::Merge => {
                let entry = snapshot
                    .entry(doc_id.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                match entry {
                    Value::Object(existing) => existing.extend(body),
                    other => *other = Value::Object(body),
                }
            }
        }
        self.persist(&paths, &snapshot).await?;

        let outcome = match mode {
            WriteMode::Replace => WriteOutcome::Created,
            WriteMode::Merge => WriteOutcome::Updated,
        };
        Ok(WriteResult::new(doc_id, outcome))
    }

    pub async fn delete(&self, index: &str, doc_id: &str) -> Result<WriteResult> {
        let paths = self.paths(index)?;
        let _guard = self.locks.acquire(index).await;

        let mut snapshot = self.load_for_write(index, &paths).await?;
        if snapshot.shift_remove(doc_id).is_none() {
            return Ok(WriteResult::new(doc_id, WriteOutcome::NotFound));
        }
        self.persist(&paths, &snapshot).await?;
        Ok(WriteResult::new(doc_id, WriteOutcome::Deleted))
    }

    /// 按业务字段（非 doc_id）定位第一个文档并浅合并
    pub async fn update_by_field(
        &self,
        index: &str,
        field: &str,
        value: &Value,
        updates: Document,
    ) -> Result<WriteResult> {
        let paths = self.paths(index)?;
        let _guard = self.locks.acquire(index).await;

        let mut snapshot = self.load_for_write(index, &paths).await?;
        let found = first_with_field(&snapshot, field, value).map(|(id, _)| id.clone());
        let Some(doc_id) = found else {
            return Ok(WriteResult::new("", WriteOutcome::NotFound));
        };
        if let Some(Value::Object(doc)) = snapshot.get_mut(&doc_id) {
            doc.extend(updates);
        }
        self.persist(&paths, &snapshot).await?;
        Ok(WriteResult::new(doc_id, WriteOutcome::Updated))
    }

    // ------------------------------------------------------------------
    // 读（不加锁）
    // ------------------------------------------------------------------

    pub async fn exists(&self, index: &str, doc_id: &str) -> Result<bool> {
        Ok(self.read_snapshot(index).await?.contains_key(doc_id))
    }

    pub async fn get(&self, index: &str, doc_id: &str) -> Result<Option<Hit>> {
        let snapshot = self.read_snapshot(index).await?;
        Ok(snapshot
            .get(doc_id)
            .map(|source| Hit::new(doc_id, source.clone())))
    }

    pub async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse> {
        self.search_request(index, &SearchRequest::parse(body)).await
    }

    pub async fn search_request(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse> {
        let snapshot = self.read_snapshot(index).await?;
        Ok(execute(&snapshot, request))
    }

    pub async fn count(&self, index: &str, body: &Value) -> Result<usize> {
        let mut request = SearchRequest::parse(body);
        request.size = 0;
        request.aggs.clear();
        Ok(self.search_request(index, &request).await?.total())
    }

    /// 文件顺序中第一个 `field == value` 的文档
    pub async fn get_by_field(
        &self,
        index: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<Hit>> {
        let snapshot = self.read_snapshot(index).await?;
        Ok(first_with_field(&snapshot, field, value)
            .map(|(id, doc)| Hit::new(id.clone(), doc.clone())))
    }

    /// 先按 `key` 快速定位；若命中文档的 `check` 字段不符，告警并退回复合查询
    /// （两个 term 的 bool.must）。
    pub async fn find_compound(
        &self,
        index: &str,
        key: (&str, &Value),
        check: (&str, &Value),
    ) -> Result<Option<Hit>> {
        let (key_field, key_value) = key;
        let (check_field, check_value) = check;

        if let Some(hit) = self.get_by_field(index, key_field, key_value).await? {
            let actual = hit.field(check_field).unwrap_or(&Value::Null);
            if json_eq(actual, check_value) {
                return Ok(Some(hit));
            }
            tracing::warn!(
                "{}={} found in {} but {} mismatch: expected {}, got {}",
                key_field,
                key_value,
                index,
                check_field,
                check_value,
                actual
            );
        }

        let request = SearchRequest::new(Query::Bool {
            must: vec![
                Query::term(check_field, check_value.clone()),
                Query::term(key_field, key_value.clone()),
            ],
            filter: Vec::new(),
        })
        .with_size(1);
        Ok(self.search_request(index, &request).await?.into_first_hit())
    }

    /// 没有需要释放的资源
    pub async fn close(&self) -> bool {
        tracing::debug!("Local store at {:?} closed", self.root);
        true
    }

    // ------------------------------------------------------------------
    // 内部：加载与落盘
    // ------------------------------------------------------------------

    /// 无锁读取；损坏视为空。旧编码文件只在能立即拿到锁时迁移为 UTF-8。
    async fn read_snapshot(&self, index: &str) -> Result<Snapshot> {
        let file = self.paths(index)?.data_file();
        match file.read(self.fallback).await? {
            Loaded::Legacy { snapshot, .. } => {
                match self.locks.try_acquire(index) {
                    Some(_guard) => {
                        // 拿到锁后重读，避免用旧内容覆盖刚完成的写
                        let reread = file.read(self.fallback).await?;
                        if let Loaded::Legacy { snapshot, encoding } = reread {
                            file.rewrite_as_utf8(&snapshot, encoding).await;
                        }
                    }
                    None => tracing::debug!("Index {} busy, utf-8 migration deferred", index),
                }
                Ok(snapshot)
            }
            loaded => Ok(loaded.into_snapshot().unwrap_or_default()),
        }
    }

    /// 调用方必须持有索引锁
    async fn load_for_write(&self, index: &str, paths: &IndexPaths) -> Result<Snapshot> {
        let file = paths.data_file();
        let mut loaded = file.read(self.fallback).await?;

        if matches!(loaded, Loaded::Missing) && self.restore_interrupted(index, paths).await? {
            loaded = file.read(self.fallback).await?;
        }

        if matches!(loaded, Loaded::Corrupt) && fs::try_exists(&paths.backup).await? {
            tracing::warn!("Index {} is corrupted, restoring {:?}", index, paths.backup);
            fs::rename(&paths.backup, &paths.data).await?;
            loaded = file.read(self.fallback).await?;
        }

        match loaded {
            Loaded::Corrupt => {
                fs::rename(&paths.data, &paths.corrupt).await?;
                tracing::error!(
                    "Index {} is corrupted, moved to {:?}; continuing with an empty index",
                    index,
                    paths.corrupt
                );
                // 即使本次操作不落盘（not_found），索引也要继续存在
                let snapshot = Snapshot::new();
                file.write(&snapshot).await?;
                Ok(snapshot)
            }
            Loaded::Legacy { snapshot, encoding } => {
                file.rewrite_as_utf8(&snapshot, encoding).await;
                Ok(snapshot)
            }
            loaded => Ok(loaded.into_snapshot().unwrap_or_default()),
        }
    }

    /// 上次写在 "改名为 .bak" 与 "原子写入" 之间中断：数据只在 .bak 里。
    /// 调用方必须持有索引锁，且已确认数据文件不存在。
    async fn restore_interrupted(&self, index: &str, paths: &IndexPaths) -> Result<bool> {
        if !fs::try_exists(&paths.backup).await? {
            return Ok(false);
        }
        tracing::warn!("Index {} has no data file, restoring {:?}", index, paths.backup);
        fs::rename(&paths.backup, &paths.data).await?;
        Ok(true)
    }

    /// 当前数据文件改名为 `.bak`（单代备份），再原子写入新快照
    async fn persist(&self, paths: &IndexPaths, snapshot: &Snapshot) -> Result<()> {
        if fs::try_exists(&paths.data).await? {
            fs::rename(&paths.data, &paths.backup).await?;
        }
        paths.data_file().write(snapshot).await
    }
}

/// 缺失字段按 null 比较；`_source` 不是对象的文档跳过
fn first_with_field<'a>(
    snapshot: &'a Snapshot,
    field: &str,
    value: &Value,
) -> Option<(&'a String, &'a Value)> {
    snapshot.iter().find(|(_, doc)| {
        doc.as_object()
            .map_or(false, |d| json_eq(d.get(field).unwrap_or(&Value::Null), value))
    })
}
