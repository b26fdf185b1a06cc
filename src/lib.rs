#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod core;
pub mod index;
pub mod query;
pub mod storage;

pub use crate::core::{
    Acknowledged, Document, Hit, Result, Snapshot, StoreConfig, StoreError, WriteMode,
    WriteOutcome, WriteResult,
};
pub use crate::index::LocalStore;
pub use crate::query::{Query, SearchRequest, SearchResponse};
