//! Core types and traits for token assignment.
//!
//! This crate provides the types shared by the generator, the store
//! backends and the assigner: tokens and their length settings, records and
//! their primary ids, and the store contract.

pub mod error;
pub mod lookup;
pub mod record;
pub mod record_id;
pub mod settings;
pub mod store;
pub mod token;

pub use error::{CoreError, StorageError};
pub use lookup::Lookup;
pub use record::Record;
pub use record_id::RecordId;
pub use settings::TokenSettings;
pub use store::{ReadStore, Scan, Store};
pub use token::Token;
