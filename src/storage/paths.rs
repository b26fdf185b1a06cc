use std::path::{Path, PathBuf};

use crate::core::error::{Result, StoreError};
use crate::storage::snapshot::SnapshotFile;

/// 一个索引在磁盘上的全部文件
///
/// - `<index>.json`：文档
/// - `<index>_mapping.json`：mapping（不做校验）
/// - `<index>.json.bak`：上一代有效快照
/// - `<index>.json.corrupt`：无法恢复而被隔离的文件
/// - `<index>.json.tmp`：原子写的临时缓冲
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexPaths {
    pub data: PathBuf,
    pub mapping: PathBuf,
    pub backup: PathBuf,
    pub corrupt: PathBuf,
    pub tmp: PathBuf,
}

impl IndexPaths {
    /// 纯函数：只做名字校验与拼接，不碰磁盘
    pub fn resolve(root: &Path, index: &str) -> Result<Self> {
        validate_index_name(index)?;
        let data = root.join(format!("{index}.json"));
        Ok(Self {
            mapping: root.join(format!("{index}_mapping.json")),
            backup: with_suffix(&data, ".bak"),
            corrupt: with_suffix(&data, ".corrupt"),
            tmp: with_suffix(&data, ".tmp"),
            data,
        })
    }

    pub fn data_file(&self) -> SnapshotFile {
        SnapshotFile::new(self.data.clone(), self.tmp.clone())
    }

    pub fn mapping_file(&self) -> SnapshotFile {
        SnapshotFile::new(self.mapping.clone(), with_suffix(&self.mapping, ".tmp"))
    }
}

/// 索引名不能为空，也不能逃出存储根目录
fn validate_index_name(index: &str) -> Result<()> {
    if index.is_empty() {
        return Err(StoreError::validation("index name must not be empty"));
    }
    if index == "." || index == ".." || index.contains(['/', '\\']) {
        return Err(StoreError::validation(format!(
            "index name {index:?} must not contain path components"
        )));
    }
    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}
