use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 每个索引一把互斥锁（懒创建）
///
/// DashMap 的分片锁只在取 / 建条目时短暂持有，等待索引锁之前已经释放，
/// 因此持有某个索引锁时不会阻塞其他索引的建表。
#[derive(Default)]
pub struct LockTable {
    inner: DashMap<String, Arc<Mutex<()>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, index: &str) -> Arc<Mutex<()>> {
        if let Some(existing) = self.inner.get(index) {
            return existing.value().clone();
        }
        self.inner
            .entry(index.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// 等待并持有索引锁；guard drop 即释放（包括错误路径）
    pub async fn acquire(&self, index: &str) -> OwnedMutexGuard<()> {
        self.handle(index).lock_owned().await
    }

    /// 不等待：锁被占用时返回 None
    pub fn try_acquire(&self, index: &str) -> Option<OwnedMutexGuard<()>> {
        self.handle(index).try_lock_owned().ok()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
