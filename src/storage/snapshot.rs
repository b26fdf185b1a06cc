use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::core::error::Result;
use crate::core::types::Snapshot;
use crate::storage::encoding::decode_strict;

/// 读取结果
///
/// `Corrupt` 与 `Missing` 必须区分：前者触发备份恢复 / 隔离，后者只是空索引。
#[derive(Clone, Debug, PartialEq)]
pub enum Loaded {
    /// 文件不存在
    Missing,
    /// UTF-8 解码 + JSON 解析成功
    Ready(Snapshot),
    /// UTF-8 解码失败，但用回退编码读成功；调用方应择机改写为 UTF-8
    Legacy {
        snapshot: Snapshot,
        encoding: &'static Encoding,
    },
    /// 无法恢复的损坏
    Corrupt,
}

impl Loaded {
    /// 缺失 → 空快照；损坏 → None
    pub fn into_snapshot(self) -> Option<Snapshot> {
        match self {
            Loaded::Missing => Some(Snapshot::new()),
            Loaded::Ready(snapshot) | Loaded::Legacy { snapshot, .. } => Some(snapshot),
            Loaded::Corrupt => None,
        }
    }
}

/// 整文件 JSON 快照（原子替换）
///
/// 落盘流程：
/// 1) 序列化完整快照写入同目录下的 tmp 文件（同一文件系统，rename 才是原子的）
/// 2) fsync(tmp)
/// 3) rename(tmp, target)
/// 4) fsync(dir)，尽力而为
/// 5) 无论成功与否，tmp 若仍存在则删除
///
/// target 要么是旧的完整内容，要么是新的完整内容；rename 前崩溃只会留下 tmp。
#[derive(Clone, Debug)]
pub struct SnapshotFile {
    path: PathBuf,
    tmp: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: PathBuf, tmp: PathBuf) -> Self {
        Self { path, tmp }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tmp(&self) -> &Path {
        &self.tmp
    }

    pub async fn exists(&self) -> Result<bool> {
        Ok(fs::try_exists(&self.path).await?)
    }

    /// 读取：先 UTF-8；只有*解码*失败才换回退编码重试，*解析*失败直接判损坏
    pub async fn read(&self, fallback: &'static Encoding) -> Result<Loaded> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Loaded::Missing),
            Err(e) => return Err(e.into()),
        };
        Ok(self.decode(&bytes, fallback))
    }

    fn decode(&self, bytes: &[u8], fallback: &'static Encoding) -> Loaded {
        match std::str::from_utf8(bytes) {
            Ok(text) => match parse_snapshot(text) {
                Ok(snapshot) => Loaded::Ready(snapshot),
                Err(reason) => {
                    tracing::error!("JSON corrupted (utf-8) at {:?}: {}", self.path, reason);
                    Loaded::Corrupt
                }
            },
            Err(_) => {
                let Some(text) = decode_strict(fallback, bytes) else {
                    tracing::error!(
                        "{:?} is neither utf-8 nor {}",
                        self.path,
                        fallback.name()
                    );
                    return Loaded::Corrupt;
                };
                match parse_snapshot(&text) {
                    Ok(snapshot) => Loaded::Legacy {
                        snapshot,
                        encoding: fallback,
                    },
                    Err(reason) => {
                        tracing::error!(
                            "JSON corrupted ({}) at {:?}: {}",
                            fallback.name(),
                            self.path,
                            reason
                        );
                        Loaded::Corrupt
                    }
                }
            }
        }
    }

    /// 原子写入（pretty JSON，非 ASCII 原样输出）
    pub async fn write<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let body = serde_json::to_vec_pretty(value)?;
        let outcome = self.replace_with(&body).await;

        // 失败路径上 tmp 可能残留
        if fs::try_exists(&self.tmp).await.unwrap_or(false) {
            if let Err(e) = fs::remove_file(&self.tmp).await {
                tracing::debug!("Failed to remove {:?}: {}", self.tmp, e);
            }
        }
        outcome
    }

    async fn replace_with(&self, body: &[u8]) -> Result<()> {
        let mut file = fs::File::create(&self.tmp).await?;
        file.write_all(body).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&self.tmp, &self.path).await?;

        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = fs::File::open(parent).await {
                let _ = dir.sync_all().await;
            }
        }

        tracing::debug!("Snapshot written: {:?}, {} bytes", self.path, body.len());
        Ok(())
    }

    /// 回退编码读到的文件改写为 UTF-8；失败只记日志
    pub async fn rewrite_as_utf8(&self, snapshot: &Snapshot, from: &'static Encoding) {
        match self.write(snapshot).await {
            Ok(()) => tracing::info!("Migrated {:?} from {} to utf-8", self.path, from.name()),
            Err(e) => tracing::warn!("Could not rewrite {:?} as utf-8: {}", self.path, e),
        }
    }
}

fn parse_snapshot(text: &str) -> std::result::Result<Snapshot, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("top level is not an object: {}", type_name(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
