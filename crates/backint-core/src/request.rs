// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tokeniser and typed request model for one protocol line.

/// One parsed input line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// `#SOFTWAREID <version> <agentInfo...>` — the session's first line.
    SoftwareId {
        /// Caller-reported version string.
        version: String,
        /// Caller-reported agent identifier (remaining tokens, rejoined).
        agent_info: String,
    },
    /// `#SAVE <path> <size>` — backup from a local file.
    Save {
        /// Cleaned local path.
        path: String,
        /// Size token as received; validated numerically by the handler so
        /// that a non-numeric size surfaces as `#ERROR` rather than
        /// aborting the stream.
        size: String,
    },
    /// `#PIPE <path> <size>` — backup from a named stream.
    Pipe {
        /// Cleaned local path (names a pipe, not a regular file).
        path: String,
        /// Size token as received; see [`Request::Save`].
        size: String,
    },
    /// `#NULL <path> [dest]` — restore latest / inquire all / delete by path.
    Null {
        /// Cleaned path.
        path: String,
        /// Optional destination path (restore only).
        dest: Option<String>,
    },
    /// `#EBID <id> <path> [dest]` — operate on an explicit backup id.
    Ebid {
        /// Caller-supplied external backup id.
        id: String,
        /// Cleaned path.
        path: String,
        /// Optional destination path (restore only).
        dest: Option<String>,
    },
    /// Any other leading token; silently dropped by the dispatcher.
    Comment(String),
}

/// A request line had the wrong number of tokens for a recognised
/// directive. This stops the whole stream.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("wrong argument count for {directive}: expected {expected}, got {got}")]
pub struct ParseError {
    directive: &'static str,
    expected: &'static str,
    got: usize,
}

/// Split a line into whitespace-separated tokens, honouring
/// double-quoted substrings that may themselves contain spaces.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

/// Remove surrounding whitespace/quotes (already stripped by [`tokenize`])
/// and collapse a leading `./`.
pub fn trim_and_clean(path: &str) -> String {
    let trimmed = path.trim();
    trimmed.strip_prefix("./").unwrap_or(trimmed).to_string()
}

/// Parse one non-empty input line into a [`Request`].
///
/// Returns `Err` only for arity violations on a recognised directive;
/// everything else recognised is accepted and left for the handler to
/// validate semantically.
pub fn parse_line(line: &str) -> Result<Request, ParseError> {
    let tokens = tokenize(line);
    let Some(head) = tokens.first() else {
        return Ok(Request::Comment(String::new()));
    };

    match head.as_str() {
        "#SOFTWAREID" => {
            if tokens.len() < 3 {
                return Err(ParseError {
                    directive: "#SOFTWAREID",
                    expected: ">= 2 arguments",
                    got: tokens.len() - 1,
                });
            }
            Ok(Request::SoftwareId {
                version: tokens[1].clone(),
                agent_info: tokens[2..].join(" "),
            })
        }
        "#SAVE" => parse_save_pipe(&tokens, "#SAVE").map(|(path, size)| Request::Save { path, size }),
        "#PIPE" => parse_save_pipe(&tokens, "#PIPE").map(|(path, size)| Request::Pipe { path, size }),
        "#NULL" => {
            if tokens.len() != 2 && tokens.len() != 3 {
                return Err(ParseError {
                    directive: "#NULL",
                    expected: "1 or 2 arguments",
                    got: tokens.len() - 1,
                });
            }
            Ok(Request::Null {
                path: trim_and_clean(&tokens[1]),
                dest: tokens.get(2).map(|d| trim_and_clean(d)),
            })
        }
        "#EBID" => {
            if tokens.len() != 3 && tokens.len() != 4 {
                return Err(ParseError {
                    directive: "#EBID",
                    expected: "2 or 3 arguments",
                    got: tokens.len() - 1,
                });
            }
            Ok(Request::Ebid {
                id: tokens[1].clone(),
                path: trim_and_clean(&tokens[2]),
                dest: tokens.get(3).map(|d| trim_and_clean(d)),
            })
        }
        _ => Ok(Request::Comment(line.to_string())),
    }
}

fn parse_save_pipe(tokens: &[String], directive: &'static str) -> Result<(String, String), ParseError> {
    if tokens.len() != 3 {
        return Err(ParseError {
            directive,
            expected: "2 arguments",
            got: tokens.len().saturating_sub(1),
        });
    }
    Ok((trim_and_clean(&tokens[1]), tokens[2].clone()))
}
