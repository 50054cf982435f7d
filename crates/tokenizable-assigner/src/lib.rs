//! Token assignment for records in a store.
//!
//! This crate provides [`TokenAssigner`], which binds short, unique,
//! write-once tokens to records on creation, re-checks them at save time,
//! seeds and clears them in bulk, and resolves lookups by id or token.
//! Core types are re-exported from `tokenizable_core`, generators from
//! `tokenizable_generator`.

pub mod assigner;
pub mod error;

pub use assigner::TokenAssigner;
pub use error::{Result, TokenizerError};
pub use tokenizable_core::{Lookup, Record, RecordId, Token, TokenSettings};
pub use tokenizable_generator::{Generator, ObfuscatedGenerator, SeqGenerator, TokenGenerator};
