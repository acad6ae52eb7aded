// SPDX-License-Identifier: MIT OR Apache-2.0
//! Function handlers — one module per `#SAVE`/`#PIPE`, `#EBID`/`#NULL`
//! (Inquire, Restore), and `#EBID` (Delete).

pub mod backup;
pub mod delete;
pub mod inquire;
pub mod restore;

use crate::config::BackintConfiguration;
use crate::naming::{self, Target};
use backint_store::{BackupObject, ObjectStoreAdapter, StoreError};

/// Find the object whose key exactly matches `<prefix><ebid>.bak` by
/// listing the containing prefix and filtering.
///
/// `ObjectStoreAdapter` has no dedicated "stat by key" method; every
/// exact-id lookup in Inquire/Restore/Delete is expressed this way so the
/// adapter surface stays minimal (list, not list-and-head).
pub(crate) async fn find_exact(
    store: &dyn ObjectStoreAdapter,
    config: &BackintConfiguration,
    cleaned_path: &str,
    ebid: &str,
) -> Result<Option<BackupObject>, StoreError> {
    let key = naming::object_key(config, cleaned_path, ebid, Target::Primary);
    let prefix = naming::object_prefix(config, cleaned_path, Target::Primary);
    let objects = store.list(&prefix).await?;
    Ok(objects.into_iter().find(|o| o.object_key == key))
}
