//! 回退编码：UTF-8 解码失败时使用的系统代码页

use encoding_rs::{Encoding, UTF_8};

use crate::core::error::{Result, StoreError};

/// 由 locale 环境变量推导系统编码（`zh_CN.GBK` → GBK）；都没有则 UTF-8
pub fn system_encoding() -> &'static Encoding {
    ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|v| !v.is_empty())
        .and_then(|locale| charset_of(&locale))
        .unwrap_or(UTF_8)
}

/// 配置里显式给出的 label 优先
pub fn resolve_fallback(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        None => Ok(system_encoding()),
        Some(label) => Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            StoreError::validation(format!("unknown fallback encoding {label:?}"))
        }),
    }
}

fn charset_of(locale: &str) -> Option<&'static Encoding> {
    let (_, rest) = locale.split_once('.')?;
    let charset = rest.split('@').next().unwrap_or(rest);
    Encoding::for_label(charset.as_bytes())
}

/// 严格解码：任何非法字节序列都视为失败
pub fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}
