// SPDX-License-Identifier: MIT OR Apache-2.0
//! The typed response model and its wire formatting.

use chrono::{DateTime, Utc};
use std::fmt;

/// One outgoing response line, always written with a trailing `\n`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// Echo of the `#SOFTWAREID` line; always the first line written.
    SoftwareId {
        /// Echoed version string.
        version: String,
        /// Echoed agent identifier.
        agent_info: String,
    },
    /// A `Save`/`Pipe` upload committed successfully.
    Saved {
        /// Newly assigned external backup id.
        ebid: String,
        /// Original request path.
        path: String,
        /// Size in bytes.
        size: u64,
    },
    /// A local I/O failure or adapter failure after retries.
    Error {
        /// Backup id, when the failing request carried one.
        ebid: Option<String>,
        /// Original request path.
        path: String,
    },
    /// One object returned from Inquire.
    Backup {
        /// Bucket-derived external backup id (never the caller-supplied one).
        ebid: String,
        /// Original request path.
        path: String,
        /// Creation timestamp, present once `#SOFTWAREID` has enabled the
        /// extended (>= 1.50) response format.
        created_at: Option<DateTime<Utc>>,
    },
    /// No matching object existed.
    NotFound {
        /// Backup id, when the failing request carried one.
        ebid: Option<String>,
        /// Original request path.
        path: String,
    },
    /// A restore download committed successfully.
    Restored {
        /// Bucket-derived external backup id.
        ebid: String,
        /// Original request path.
        path: String,
    },
    /// A delete committed successfully.
    Deleted {
        /// Backup id that was deleted.
        ebid: String,
        /// Original request path.
        path: String,
    },
}

fn quoted(s: &str) -> String {
    format!("\"{s}\"")
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::SoftwareId { version, agent_info } => {
                write!(f, "#SOFTWAREID {} {}", quoted(version), quoted(agent_info))
            }
            Response::Saved { ebid, path, size } => {
                write!(f, "#SAVED {} {} {size}", quoted(ebid), quoted(path))
            }
            Response::Error { ebid: Some(ebid), path } => {
                write!(f, "#ERROR {} {}", quoted(ebid), quoted(path))
            }
            Response::Error { ebid: None, path } => write!(f, "#ERROR {}", quoted(path)),
            Response::Backup {
                ebid,
                path,
                created_at: Some(ts),
            } => write!(
                f,
                "#BACKUP {} {} {}",
                quoted(ebid),
                quoted(path),
                quoted(&ts.to_rfc3339())
            ),
            Response::Backup {
                ebid,
                path,
                created_at: None,
            } => write!(f, "#BACKUP {} {}", quoted(ebid), quoted(path)),
            Response::NotFound { ebid: Some(ebid), path } => {
                write!(f, "#NOTFOUND {} {}", quoted(ebid), quoted(path))
            }
            Response::NotFound { ebid: None, path } => write!(f, "#NOTFOUND {}", quoted(path)),
            Response::Restored { ebid, path } => {
                write!(f, "#RESTORED {} {}", quoted(ebid), quoted(path))
            }
            Response::Deleted { ebid, path } => {
                write!(f, "#DELETED {} {}", quoted(ebid), quoted(path))
            }
        }
    }
}

impl Response {
    /// Render this response as a complete, newline-terminated wire line.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}
