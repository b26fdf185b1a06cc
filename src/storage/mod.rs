pub mod encoding;
pub mod paths;
pub mod snapshot;

pub use paths::IndexPaths;
pub use snapshot::{Loaded, SnapshotFile};
