//! Store backends implementing the `tokenizable_core` store contract.

pub mod memory;
pub mod mysql;

pub use memory::InMemoryStore;
pub use mysql::MySqlStore;
pub use tokenizable_core::{ReadStore, Scan, StorageError, Store};
