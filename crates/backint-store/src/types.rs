// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value types shared by every [`crate::ObjectStoreAdapter`] implementation.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Metadata key recording whether a backup came from a file or a named
/// pipe. Restore consults this and never infers the type from the path.
pub const BACKUP_TYPE_KEY: &str = "X-Backup-Type";

/// Value of [`BACKUP_TYPE_KEY`] for a `#SAVE`-originated backup.
pub const BACKUP_TYPE_FILE: &str = "FILE";

/// Value of [`BACKUP_TYPE_KEY`] for a `#PIPE`-originated backup.
pub const BACKUP_TYPE_PIPE: &str = "PIPE";

/// One object in the bucket, as returned by [`crate::ObjectStoreAdapter::list`]
/// or resolved by an exact-key lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupObject {
    /// Full object key, e.g. `user1backup/path/e1700000000-ab12.bak`.
    pub object_key: String,
    /// Size in bytes.
    pub size: u64,
    /// Creation time, used to order `list()` results newest-first.
    pub created_at: DateTime<Utc>,
    /// Object metadata, always containing [`BACKUP_TYPE_KEY`].
    pub metadata: BTreeMap<String, String>,
}

impl BackupObject {
    /// The external backup id embedded in the key: the basename with the
    /// `.bak` extension stripped.
    ///
    /// Inquire and Restore always echo this, never a caller-supplied id,
    /// so a typo'd EBID cannot silently round-trip as "found".
    pub fn ebid(&self) -> &str {
        let base = self
            .object_key
            .rsplit('/')
            .next()
            .unwrap_or(&self.object_key);
        base.strip_suffix(".bak").unwrap_or(base)
    }

    /// `true` if this object was backed up from a named pipe.
    pub fn is_pipe(&self) -> bool {
        self.metadata.get(BACKUP_TYPE_KEY).map(String::as_str) == Some(BACKUP_TYPE_PIPE)
    }
}

/// Encryption mode for a single upload or download. Only one of
/// [`Encryption::Csek`] / [`Encryption::Kms`] may be active at a time —
/// enforced by the caller before any bytes move.
#[derive(Clone, Debug, Default)]
pub enum Encryption {
    /// No server-side encryption parameter beyond the bucket's default.
    #[default]
    None,
    /// Customer-supplied encryption key: raw 256-bit key material.
    Csek {
        /// Raw key bytes, taken verbatim from the matching key-file entry.
        key: [u8; 32],
    },
    /// Customer-managed key identified by a KMS resource name.
    Kms {
        /// Fully qualified KMS key resource name.
        key_name: String,
    },
}

/// Bucket-level attributes relevant to preflight checks.
#[derive(Clone, Debug, Default)]
pub struct BucketAttrs {
    /// Human-readable description of the bucket's retention policy, if any.
    /// `Some` means `Delete` would be unable to remove objects immediately.
    pub retention_policy: Option<String>,
}
