// SPDX-License-Identifier: MIT OR Apache-2.0
//! Object key derivation and external backup id (EBID) generation.

use crate::config::BackintConfiguration;
use chrono::Utc;
use uuid::Uuid;

/// Which bucket a key targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// The writable primary bucket.
    Primary,
    /// The read-only recovery bucket.
    Recovery,
}

/// Compute the object key `<userId><cleanedPath>/<ebid>.bak`, rooted under
/// the folder prefix for the selected bucket.
pub fn object_key(config: &BackintConfiguration, cleaned_path: &str, ebid: &str, target: Target) -> String {
    let prefix = match target {
        Target::Primary => config.primary_prefix(),
        Target::Recovery => config.recovery_prefix(),
    };
    format!("{}{}{}/{}.bak", config.user_id, prefix, cleaned_path, ebid)
}

/// Prefix matching every object for a given path, used by list-based
/// Inquire/Restore/Delete (`Null` requests).
pub fn object_prefix(config: &BackintConfiguration, cleaned_path: &str, target: Target) -> String {
    let prefix = match target {
        Target::Primary => config.primary_prefix(),
        Target::Recovery => config.recovery_prefix(),
    };
    format!("{}{}{}/", config.user_id, prefix, cleaned_path)
}

/// Generate a fresh, URL-safe external backup id.
///
/// A monotonic-ish timestamp component plus a random UUID suffix: unique
/// within one invocation is enough, since the object key is additionally
/// scoped by user id and path.
pub fn generate_ebid() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("e{millis}-{}", &suffix[..8])
}
