//! Token views over a [`Secret`].
//!
//! Token information lives in `auth` for login responses and in `data` for
//! token lookups. Most accessors check `auth` first, then `data`, and every
//! accessor returns the neutral value when no well-formed answer exists.

use super::Secret;
use crate::duration::duration_from_value;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

impl Secret {
    /// Returns the token carried by this secret, or `""`.
    pub fn token_id(&self) -> &str {
        if let Some(auth) = &self.auth {
            if !auth.client_token.is_empty() {
                return &auth.client_token;
            }
        }
        self.data_str("id").unwrap_or_default()
    }

    /// Returns the accessor of the token carried by this secret, or `""`.
    pub fn token_accessor(&self) -> &str {
        if let Some(auth) = &self.auth {
            if !auth.accessor.is_empty() {
                return &auth.accessor;
            }
        }
        self.data_str("accessor").unwrap_or_default()
    }

    /// Returns the remaining uses reported by a token lookup, or zero.
    ///
    /// Zero also means unlimited.
    pub fn token_remaining_uses(&self) -> u64 {
        self.data_value("num_uses")
            .and_then(value_as_u64)
            .unwrap_or(0)
    }

    /// Returns the token's policies, including identity policies from a lookup.
    pub fn token_policies(&self) -> Vec<String> {
        if let Some(auth) = &self.auth {
            if !auth.policies.is_empty() {
                return auth.policies.clone();
            }
        }
        let Some(token) = self.data_value("policies") else {
            return Vec::new();
        };
        let Some(mut policies) = string_list(token) else {
            return Vec::new();
        };
        if let Some(identity) = self.data_value("identity_policies") {
            match string_list(identity) {
                Some(identity) => policies.extend(identity),
                None => return Vec::new(),
            }
        }
        policies
    }

    /// Returns the metadata attached to the token.
    ///
    /// Lookups report it under `metadata` or the older `meta` key.
    pub fn token_metadata(&self) -> HashMap<String, String> {
        if let Some(auth) = &self.auth {
            if !auth.metadata.is_empty() {
                return auth.metadata.clone();
            }
        }
        let raw = self
            .data_value("metadata")
            .filter(|v| !v.is_null())
            .or_else(|| self.data_value("meta"));
        match raw {
            Some(Value::Object(map)) => string_map(map).unwrap_or_default(),
            _ => HashMap::new(),
        }
    }

    /// Returns whether the token can be renewed.
    ///
    /// Accepts a boolean or its string form in lookup data.
    pub fn token_is_renewable(&self) -> bool {
        if let Some(auth) = &self.auth {
            if auth.renewable {
                return true;
            }
        }
        match self.data_value("renewable") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.parse().unwrap_or(false),
            _ => false,
        }
    }

    /// Returns the token's remaining TTL, zero when not reported.
    ///
    /// Accepts a number of seconds, a numeric string or a duration string in
    /// lookup data.
    pub fn token_ttl(&self) -> Duration {
        if let Some(auth) = &self.auth {
            if auth.lease_duration > 0 {
                return Duration::from_secs(auth.lease_duration);
            }
        }
        self.data_value("ttl")
            .and_then(duration_from_value)
            .unwrap_or(Duration::ZERO)
    }

    fn data_value(&self, key: &str) -> Option<&Value> {
        self.data.as_ref()?.get(key)
    }

    fn data_str(&self, key: &str) -> Option<&str> {
        self.data_value(key)?.as_str()
    }
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

fn string_map(map: &Map<String, Value>) -> Option<HashMap<String, String>> {
    map.iter()
        .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::secret::{Secret, SecretAuth};
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    fn with_data(data: serde_json::Value) -> Secret {
        let serde_json::Value::Object(map) = data else {
            panic!("test data must be an object");
        };
        Secret {
            data: Some(map),
            ..Secret::default()
        }
    }

    #[test]
    fn test_accessors_on_empty_secret_are_neutral() {
        let secret = Secret::default();
        assert_eq!(secret.token_id(), "");
        assert_eq!(secret.token_accessor(), "");
        assert_eq!(secret.token_remaining_uses(), 0);
        assert!(secret.token_policies().is_empty());
        assert!(secret.token_metadata().is_empty());
        assert!(!secret.token_is_renewable());
        assert_eq!(secret.token_ttl(), Duration::ZERO);
    }

    #[test]
    fn test_oversized_ttl_in_data_is_zero() {
        let secret = Secret::parse(br#"{"data":{"ttl":123456789012345678901234567890}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(secret.token_ttl(), Duration::ZERO);
    }

    #[test]
    fn test_auth_block_wins_over_data() {
        let secret = Secret {
            auth: Some(SecretAuth {
                client_token: "auth-token".into(),
                accessor: "auth-accessor".into(),
                policies: vec!["default".into()],
                metadata: HashMap::from([("user".to_string(), "armon".to_string())]),
                lease_duration: 3600,
                renewable: true,
                ..SecretAuth::default()
            }),
            ..with_data(json!({"id": "data-token", "accessor": "data-accessor", "ttl": 5}))
        };
        assert_eq!(secret.token_id(), "auth-token");
        assert_eq!(secret.token_accessor(), "auth-accessor");
        assert_eq!(secret.token_policies(), ["default"]);
        assert_eq!(secret.token_metadata()["user"], "armon");
        assert!(secret.token_is_renewable());
        assert_eq!(secret.token_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_lookup_data_accessors() {
        let secret = with_data(json!({
            "id": "s.abc",
            "accessor": "acc",
            "num_uses": 3,
            "policies": ["default", "dev"],
            "identity_policies": ["ops"],
            "meta": {"team": "infra"},
            "renewable": "true",
            "ttl": "2764800",
        }));
        assert_eq!(secret.token_id(), "s.abc");
        assert_eq!(secret.token_accessor(), "acc");
        assert_eq!(secret.token_remaining_uses(), 3);
        assert_eq!(secret.token_policies(), ["default", "dev", "ops"]);
        assert_eq!(secret.token_metadata()["team"], "infra");
        assert!(secret.token_is_renewable());
        assert_eq!(secret.token_ttl(), Duration::from_secs(2_764_800));
    }

    #[test]
    fn test_remaining_uses_reads_lookup_data_only() {
        let mut secret = with_data(json!({"num_uses": "5"}));
        secret.auth = Some(SecretAuth {
            num_uses: 9,
            ..SecretAuth::default()
        });
        assert_eq!(secret.token_remaining_uses(), 5);

        secret.data = None;
        assert_eq!(secret.token_remaining_uses(), 0);
    }

    #[test]
    fn test_metadata_key_preferred_over_meta() {
        let secret = with_data(json!({
            "metadata": {"source": "metadata"},
            "meta": {"source": "meta"},
        }));
        assert_eq!(secret.token_metadata()["source"], "metadata");
    }

    #[test]
    fn test_misshapen_data_yields_neutral_values() {
        let secret = with_data(json!({
            "id": 42,
            "policies": ["ok", 7],
            "metadata": {"n": 1},
            "renewable": "maybe",
            "ttl": [1],
            "num_uses": "many",
        }));
        assert_eq!(secret.token_id(), "");
        assert!(secret.token_policies().is_empty());
        assert!(secret.token_metadata().is_empty());
        assert!(!secret.token_is_renewable());
        assert_eq!(secret.token_ttl(), Duration::ZERO);
        assert_eq!(secret.token_remaining_uses(), 0);
    }

    #[test]
    fn test_ttl_accepts_duration_string() {
        let secret = with_data(json!({"ttl": "1h"}));
        assert_eq!(secret.token_ttl(), Duration::from_secs(3600));
    }
}
