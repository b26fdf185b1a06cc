pub mod locks;
pub mod store;

pub use locks::LockTable;
pub use store::LocalStore;
