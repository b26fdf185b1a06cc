use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, StoreError};

const STORE_DIR_NAME: &str = "local_es_data";

/// 存储配置（TOML）
///
/// ```toml
/// data_dir = "/var/cache/local-es/local_es_data"
/// fallback_encoding = "gbk"
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// 所有索引文件所在目录
    pub data_dir: PathBuf,
    /// 覆盖系统 locale 推导出的回退编码（WHATWG label，如 "gbk"）
    pub fallback_encoding: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            fallback_encoding: None,
        }
    }
}

impl StoreConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// 从 TOML 文件加载；缺省字段取默认值
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw).map_err(|source| StoreError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_toml(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

fn default_data_dir() -> PathBuf {
    match dirs::cache_dir() {
        Some(cache) => cache.join("local-es").join(STORE_DIR_NAME),
        None => PathBuf::from("cache_dir").join(STORE_DIR_NAME),
    }
}
