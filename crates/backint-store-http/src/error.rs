// SPDX-License-Identifier: MIT OR Apache-2.0
//! Mapping from transport-level failures to [`backint_store::StoreError`].

use backint_store::StoreError;

pub(crate) fn from_reqwest(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

pub(crate) fn from_status(status: reqwest::StatusCode, key: &str) -> StoreError {
    if status == reqwest::StatusCode::NOT_FOUND {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Transport(format!("unexpected status {status} for {key}"))
    }
}
