//! JSON Patch subset: `add`, `replace`, `remove` with JSON Pointer paths
//! (RFC 6902 / RFC 6901). This is everything the state:patch message carries;
//! `move`/`copy`/`test` are not part of the protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One structural edit operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Replace { path: String, value: Value },
    Remove { path: String },
}

impl PatchOp {
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. } | PatchOp::Replace { path, .. } | PatchOp::Remove { path } => {
                path
            }
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("path {0:?} does not exist")]
    MissingPath(String),

    #[error("invalid pointer {0:?}")]
    InvalidPointer(String),

    #[error("index {index} out of bounds at {path:?}")]
    OutOfBounds { path: String, index: usize },
}

/// Apply a single operation to `target` in place.
pub fn apply(target: &mut Value, op: &PatchOp) -> Result<(), PatchError> {
    let path = op.path();
    if path.is_empty() {
        // Pointer "" addresses the whole document.
        return match op {
            PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => {
                *target = value.clone();
                Ok(())
            }
            PatchOp::Remove { .. } => Err(PatchError::InvalidPointer(path.to_string())),
        };
    }

    let mut tokens = parse_pointer(path)?;
    let last = tokens.pop().expect("non-empty pointer has a last token");
    let parent = navigate(target, &tokens, path)?;

    match op {
        PatchOp::Add { value, .. } => match parent {
            Value::Object(map) => {
                map.insert(last, value.clone());
                Ok(())
            }
            Value::Array(items) => {
                if last == "-" {
                    items.push(value.clone());
                    return Ok(());
                }
                let index = parse_index(&last, path)?;
                if index > items.len() {
                    return Err(PatchError::OutOfBounds {
                        path: path.to_string(),
                        index,
                    });
                }
                items.insert(index, value.clone());
                Ok(())
            }
            _ => Err(PatchError::MissingPath(path.to_string())),
        },
        PatchOp::Replace { value, .. } => match parent {
            Value::Object(map) => match map.get_mut(&last) {
                Some(slot) => {
                    *slot = value.clone();
                    Ok(())
                }
                None => Err(PatchError::MissingPath(path.to_string())),
            },
            Value::Array(items) => {
                let index = parse_index(&last, path)?;
                match items.get_mut(index) {
                    Some(slot) => {
                        *slot = value.clone();
                        Ok(())
                    }
                    None => Err(PatchError::OutOfBounds {
                        path: path.to_string(),
                        index,
                    }),
                }
            }
            _ => Err(PatchError::MissingPath(path.to_string())),
        },
        PatchOp::Remove { .. } => match parent {
            Value::Object(map) => map
                .remove(&last)
                .map(|_| ())
                .ok_or_else(|| PatchError::MissingPath(path.to_string())),
            Value::Array(items) => {
                let index = parse_index(&last, path)?;
                if index >= items.len() {
                    return Err(PatchError::OutOfBounds {
                        path: path.to_string(),
                        index,
                    });
                }
                items.remove(index);
                Ok(())
            }
            _ => Err(PatchError::MissingPath(path.to_string())),
        },
    }
}

/// Split a JSON Pointer into unescaped reference tokens.
fn parse_pointer(path: &str) -> Result<Vec<String>, PatchError> {
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| PatchError::InvalidPointer(path.to_string()))?;
    Ok(rest
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn parse_index(token: &str, path: &str) -> Result<usize, PatchError> {
    token
        .parse()
        .map_err(|_| PatchError::InvalidPointer(path.to_string()))
}

fn navigate<'a>(
    target: &'a mut Value,
    tokens: &[String],
    path: &str,
) -> Result<&'a mut Value, PatchError> {
    let mut current = target;
    for token in tokens {
        current = match current {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| PatchError::MissingPath(path.to_string()))?,
            Value::Array(items) => {
                let index = parse_index(token, path)?;
                items
                    .get_mut(index)
                    .ok_or_else(|| PatchError::OutOfBounds {
                        path: path.to_string(),
                        index,
                    })?
            }
            _ => return Err(PatchError::MissingPath(path.to_string())),
        };
    }
    Ok(current)
}
