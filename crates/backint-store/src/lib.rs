// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Object store adapter contract for the Backint protocol engine.
//!
//! This crate defines *what* the core needs from a bucket
//! ([`ObjectStoreAdapter`]) without committing to a transport. See
//! `backint-store-mock` for tests/diagnostics and `backint-store-http`
//! for a real, `reqwest`-backed implementation.

mod adapter;
mod error;
mod types;

pub use adapter::{BoxedReader, BoxedWriter, ObjectStoreAdapter};
pub use error::StoreError;
pub use types::{BackupObject, BucketAttrs, Encryption, BACKUP_TYPE_FILE, BACKUP_TYPE_KEY, BACKUP_TYPE_PIPE};
