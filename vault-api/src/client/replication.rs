//! Replication-state tracking for read-your-writes consistency.
//!
//! Performance standbys answer from local storage, which may lag behind the
//! active node. Every response carries the node's state in the `X-Vault-Index`
//! header; sending the newest known states back lets a standby wait (or
//! forward) until it has caught up.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::cmp::Ordering;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Errors returned by [`ReplicationState::parse`].
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReplicationStateError {
    /// The header value is not valid base64.
    #[error("replication state is not valid base64")]
    Encoding,
    /// The decoded value is not `v1:<cluster>:<local>:<replicated>:<hmac>`.
    #[error("invalid replication state format")]
    Format,
}

/// A decoded replication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationState {
    /// Cluster the indexes belong to.
    pub cluster_id: String,
    /// Local write-ahead-log index.
    pub local_index: u64,
    /// Replicated write-ahead-log index.
    pub replicated_index: u64,
}

impl ReplicationState {
    /// Decodes a header value.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationStateError`] if the value is not base64 or the
    /// decoded text does not have the expected shape. The trailing HMAC is only
    /// checked for being hex; verifying it needs the server's key.
    pub fn parse(encoded: &str) -> Result<Self, ReplicationStateError> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|_| ReplicationStateError::Encoding)?;
        let text = String::from_utf8(raw).map_err(|_| ReplicationStateError::Format)?;

        let (state, hmac) = text.rsplit_once(':').ok_or(ReplicationStateError::Format)?;
        if hmac.len() % 2 != 0 || !hmac.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ReplicationStateError::Format);
        }

        let pieces: Vec<&str> = state.split(':').collect();
        let [version, cluster_id, local, replicated] = pieces.as_slice() else {
            return Err(ReplicationStateError::Format);
        };
        if *version != "v1" || cluster_id.is_empty() {
            return Err(ReplicationStateError::Format);
        }

        Ok(Self {
            cluster_id: (*cluster_id).to_string(),
            local_index: local.parse().map_err(|_| ReplicationStateError::Format)?,
            replicated_index: replicated
                .parse()
                .map_err(|_| ReplicationStateError::Format)?,
        })
    }

    /// Compares two states of the same cluster.
    ///
    /// `Greater` when `self` is at least as new on both indexes, `Less` when it
    /// is at most as new on both, `None` when the indexes disagree or the
    /// clusters differ.
    fn dominance(&self, other: &Self) -> Option<Ordering> {
        if self.cluster_id != other.cluster_id {
            return None;
        }
        if self.local_index >= other.local_index && self.replicated_index >= other.replicated_index
        {
            Some(Ordering::Greater)
        } else if self.local_index <= other.local_index
            && self.replicated_index <= other.replicated_index
        {
            Some(Ordering::Less)
        } else {
            Some(Ordering::Equal)
        }
    }
}

/// Merges a newly observed state into the known states.
///
/// Known states dominated by `new` are replaced by it, states that dominate
/// `new` are kept, incomparable states are both kept. The result is sorted and
/// de-duplicated. Falls back to `[new]` when there is nothing to merge with,
/// when more than two states are known, or when any state cannot be decoded or
/// belongs to another cluster.
pub fn merge_replication_states(old: &[String], new: &str) -> Vec<String> {
    if old.is_empty() || old.len() > 2 {
        return vec![new.to_string()];
    }
    let Ok(incoming) = ReplicationState::parse(new) else {
        return vec![new.to_string()];
    };

    let mut merged = Vec::with_capacity(old.len() + 1);
    for existing in old {
        let Ok(state) = ReplicationState::parse(existing) else {
            return vec![new.to_string()];
        };
        match state.dominance(&incoming) {
            Some(Ordering::Greater) => merged.push(existing.clone()),
            Some(Ordering::Less) => merged.push(new.to_string()),
            Some(Ordering::Equal) => {
                merged.push(existing.clone());
                merged.push(new.to_string());
            }
            None => return vec![new.to_string()],
        }
    }
    merged.sort();
    merged.dedup();
    merged
}

/// Forwarding behavior requested from performance standbys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplicationForwarding {
    /// Let the standby decide.
    #[default]
    None,
    /// Forward to the active node when the standby lags behind the sent state.
    Inconsistent,
    /// Always forward to the active node.
    Always,
}

/// Shared store of the newest replication states seen by a client family.
#[derive(Debug, Default)]
pub(crate) struct ReplicationStateStore {
    states: RwLock<Vec<String>>,
}

impl ReplicationStateStore {
    pub(crate) fn record(&self, new: &str) {
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        *states = merge_replication_states(&states, new);
    }

    pub(crate) fn states(&self) -> Vec<String> {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(s: &str) -> String {
        STANDARD.encode(s)
    }

    fn decode_all(states: &[String]) -> Vec<String> {
        states
            .iter()
            .map(|s| String::from_utf8(STANDARD.decode(s).unwrap()).unwrap())
            .collect()
    }

    macro_rules! merge_cases {
        ($($name:ident: [$($old:expr),*], $new:expr => [$($expected:expr),*],)*) => {
            $(
                #[test]
                fn $name() {
                    let old: Vec<String> = vec![$(b64($old)),*];
                    let out = merge_replication_states(&old, &b64($new));
                    let expected: Vec<&str> = vec![$($expected),*];
                    assert_eq!(decode_all(&out), expected);
                }
            )*
        };
    }

    merge_cases! {
        test_merge_empty_old: [], "v1:cid:1:0:" => ["v1:cid:1:0:"],
        test_merge_old_smaller: ["v1:cid:1:0:"], "v1:cid:2:0:" => ["v1:cid:2:0:"],
        test_merge_old_bigger: ["v1:cid:2:0:"], "v1:cid:1:0:" => ["v1:cid:2:0:"],
        test_merge_mixed_single: ["v1:cid:1:0:"], "v1:cid:0:1:" => ["v1:cid:0:1:", "v1:cid:1:0:"],
        test_merge_mixed_single_alt: ["v1:cid:0:1:"], "v1:cid:1:0:" => ["v1:cid:0:1:", "v1:cid:1:0:"],
        test_merge_mixed_double: ["v1:cid:0:1:", "v1:cid:1:0:"], "v1:cid:2:0:" => ["v1:cid:0:1:", "v1:cid:2:0:"],
        test_merge_newer_both: ["v1:cid:0:1:", "v1:cid:1:0:"], "v1:cid:2:1:" => ["v1:cid:2:1:"],
        test_merge_other_cluster: ["v1:cid:5:5:"], "v1:other:1:1:" => ["v1:other:1:1:"],
    }

    #[test]
    fn test_parse_state() {
        let state = ReplicationState::parse(&b64("v1:cid:3:7:abcd")).unwrap();
        assert_eq!(state.cluster_id, "cid");
        assert_eq!(state.local_index, 3);
        assert_eq!(state.replicated_index, 7);
    }

    #[test]
    fn test_parse_rejects_bad_states() {
        assert_eq!(
            ReplicationState::parse("%%%"),
            Err(ReplicationStateError::Encoding)
        );
        for bad in ["v2:cid:1:1:", "v1::1:1:", "v1:cid:1:", "v1:cid:x:1:", "v1:cid:1:1:zz"] {
            assert_eq!(
                ReplicationState::parse(&b64(bad)),
                Err(ReplicationStateError::Format),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_store_keeps_newest_state() {
        let store = ReplicationStateStore::default();
        for s in ["v1:cid:0:2:", "v1:cid:0:4:", "v1:cid:0:3:"] {
            store.record(&b64(s));
        }
        assert_eq!(decode_all(&store.states()), ["v1:cid:0:4:"]);
    }
}
