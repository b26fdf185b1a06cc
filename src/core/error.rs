use std::path::PathBuf;

/// 存储层错误
///
/// 损坏与"未找到"都不是错误：前者走备份恢复 / 隔离策略，后者以结果值返回。
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 非法参数（空索引名、空 mapping、越界的索引名等）
    #[error("validation failed: {0}")]
    Validation(String),

    /// 磁盘 I/O 错误，原样上抛
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON 序列化失败
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// 配置文件无法解析
    #[error("invalid config {path:?}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
