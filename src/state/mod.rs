//! Canonical snapshot of the synchronized value.
//!
//! The store is driven by two inbound message kinds: a full replacement
//! (`state:change`) and an incremental patch (`state:patch`). Either way it
//! produces exactly one [`StateChange`] carrying the complete post-update
//! value, never a delta.

pub mod patch;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
pub use patch::{PatchError, PatchOp};

/// Channel message name carrying a full state replacement.
pub const STATE_CHANGE_EVENT: &str = "state:change";
/// Channel message name carrying an incremental patch.
pub const STATE_PATCH_EVENT: &str = "state:patch";

/// Payload of a `state:change` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatePayload {
    pub state: Value,
    pub version: u64,
}

/// Payload of a `state:patch` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchPayload {
    pub patch: Vec<PatchOp>,
    pub version: u64,
}

/// Notification raised after every snapshot change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateChange {
    /// Complete current value, whether the trigger was a replacement or a
    /// patch.
    pub state: Value,
    pub version: u64,
}

/// Holds the snapshot and its version. The snapshot is undefined until the
/// first full replacement arrives.
#[derive(Debug, Default)]
pub struct StateStore {
    value: Option<Value>,
    version: u64,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, if any replacement has arrived yet.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Unconditional full replacement. Always safe regardless of the prior
    /// version; used for the initial join and for resynchronization.
    pub fn replace(&mut self, state: Value, version: u64) -> StateChange {
        self.value = Some(state.clone());
        self.version = version;
        StateChange { state, version }
    }

    /// Apply a patch against the current value and adopt the supplied
    /// version.
    ///
    /// The transport is the ordering authority, so no strict version chain is
    /// enforced; a gap is logged and the patch applied anyway. Inapplicable
    /// operations are skipped rather than aborting the patch; the skips come
    /// back to the caller so they can be surfaced as a diagnostic.
    pub fn apply_patch(
        &mut self,
        ops: &[PatchOp],
        version: u64,
    ) -> Result<(StateChange, Vec<PatchError>), Error> {
        let value = self.value.as_mut().ok_or_else(|| {
            Error::Patch("patch received before any full state, dropping".into())
        })?;

        if version != self.version + 1 {
            tracing::warn!(
                have = self.version,
                got = version,
                "patch version gap, applying anyway"
            );
        }

        let mut skipped = Vec::new();
        for op in ops {
            if let Err(err) = patch::apply(value, op) {
                tracing::warn!(%err, "skipping inapplicable patch op");
                skipped.push(err);
            }
        }

        self.version = version;
        let change = StateChange {
            state: value.clone(),
            version,
        };
        Ok((change, skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn undefined_until_first_replacement() {
        let mut store = StateStore::new();
        assert!(store.value().is_none());
        let change = store.replace(json!({"a": 1}), 1);
        assert_eq!(change.state, json!({"a": 1}));
        assert_eq!(change.version, 1);
        assert_eq!(store.value(), Some(&json!({"a": 1})));
    }

    #[test]
    fn patch_produces_post_update_value() {
        let mut store = StateStore::new();
        store.replace(json!({"a": 1}), 1);
        let ops = vec![PatchOp::Replace {
            path: "/a".into(),
            value: json!(2),
        }];
        let (change, skipped) = store.apply_patch(&ops, 2).unwrap();
        assert!(skipped.is_empty());
        assert_eq!(change, StateChange { state: json!({"a": 2}), version: 2 });
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn patch_before_state_is_rejected() {
        let mut store = StateStore::new();
        let ops = vec![PatchOp::Remove { path: "/a".into() }];
        assert!(matches!(store.apply_patch(&ops, 1), Err(Error::Patch(_))));
        assert!(store.value().is_none());
    }

    #[test]
    fn bad_ops_are_skipped_not_fatal() {
        let mut store = StateStore::new();
        store.replace(json!({"a": 1}), 1);
        let ops = vec![
            PatchOp::Remove {
                path: "/missing".into(),
            },
            PatchOp::Replace {
                path: "/a".into(),
                value: json!(3),
            },
        ];
        let (change, skipped) = store.apply_patch(&ops, 2).unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(change.state, json!({"a": 3}));
    }

    #[test]
    fn version_gap_still_applies() {
        let mut store = StateStore::new();
        store.replace(json!({"n": 0}), 1);
        let ops = vec![PatchOp::Replace {
            path: "/n".into(),
            value: json!(9),
        }];
        let (change, _) = store.apply_patch(&ops, 7).unwrap();
        assert_eq!(change.version, 7);
        assert_eq!(store.value(), Some(&json!({"n": 9})));
    }
}
