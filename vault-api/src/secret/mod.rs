//! The response envelope shared by most endpoints.
//!
//! Every field is optional on the wire. Numbers inside [`Secret::data`] keep
//! their original textual form, so a decode followed by an encode never changes
//! a lease duration, a version counter or an opaque numeric payload.

mod accessors;

use crate::error::ClientError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use time::OffsetDateTime;

/// Top-level keys of the envelope; a body with none of them is a raw object.
const ENVELOPE_FIELDS: [&str; 9] = [
    "request_id",
    "lease_id",
    "renewable",
    "lease_duration",
    "data",
    "wrap_info",
    "warnings",
    "auth",
    "mount_type",
];

/// Envelope returned by the server for reads, writes, logins and renewals.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    /// Server-assigned identifier of the request that produced this secret.
    #[serde(default, deserialize_with = "nullable")]
    pub request_id: String,

    /// Lease identifier, empty for unleased data.
    #[serde(default, deserialize_with = "nullable")]
    pub lease_id: String,

    /// Whether the lease can be renewed.
    #[serde(default, deserialize_with = "nullable")]
    pub renewable: bool,

    /// Lease duration in seconds.
    #[serde(default, deserialize_with = "nullable")]
    pub lease_duration: u64,

    /// Arbitrary payload. Depends entirely on the endpoint.
    #[serde(default)]
    pub data: Option<Map<String, Value>>,

    /// Present when the response was wrapped instead of returned directly.
    #[serde(default)]
    pub wrap_info: Option<SecretWrapInfo>,

    /// Non-fatal warnings the server attached to the response.
    #[serde(default)]
    pub warnings: Option<Vec<String>>,

    /// Present on login and token operations.
    #[serde(default)]
    pub auth: Option<SecretAuth>,

    /// Type of the mount that served the request.
    #[serde(default, deserialize_with = "nullable")]
    pub mount_type: String,
}

/// Authentication block of a [`Secret`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretAuth {
    /// The issued token.
    #[serde(default, deserialize_with = "nullable")]
    pub client_token: String,
    /// Accessor of the issued token.
    #[serde(default, deserialize_with = "nullable")]
    pub accessor: String,
    /// Effective policies.
    #[serde(default, deserialize_with = "nullable")]
    pub policies: Vec<String>,
    /// Policies attached to the token itself.
    #[serde(default, deserialize_with = "nullable")]
    pub token_policies: Vec<String>,
    /// Policies inherited from the identity system.
    #[serde(default, deserialize_with = "nullable")]
    pub identity_policies: Vec<String>,
    /// Metadata attached by the auth method.
    #[serde(default, deserialize_with = "nullable")]
    pub metadata: HashMap<String, String>,
    /// Whether the token has no parent.
    #[serde(default, deserialize_with = "nullable")]
    pub orphan: bool,
    /// Identity entity the token belongs to.
    #[serde(default, deserialize_with = "nullable")]
    pub entity_id: String,
    /// Token TTL in seconds.
    #[serde(default, deserialize_with = "nullable")]
    pub lease_duration: u64,
    /// Whether the token can be renewed.
    #[serde(default, deserialize_with = "nullable")]
    pub renewable: bool,
    /// Pending multi-factor requirement; the token is not usable until validated.
    #[serde(default)]
    pub mfa_requirement: Option<MfaRequirement>,
    /// `service` or `batch`.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub token_type: String,
    /// Remaining uses, zero for unlimited.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "is_zero")]
    pub num_uses: u64,
}

/// Multi-factor authentication requirement returned by a login.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MfaRequirement {
    /// Identifier to pass back when validating.
    #[serde(default, deserialize_with = "nullable")]
    pub mfa_request_id: String,
    /// Named constraints, each satisfiable by any of its methods.
    #[serde(default, deserialize_with = "nullable")]
    pub mfa_constraints: HashMap<String, MfaConstraintAny>,
}

/// A constraint satisfied by any one of the listed methods.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MfaConstraintAny {
    /// Acceptable methods.
    #[serde(default, deserialize_with = "nullable")]
    pub any: Vec<MfaMethodId>,
}

/// Reference to a configured MFA method.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MfaMethodId {
    /// Method type, e.g. `totp` or `duo`.
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub method_type: String,
    /// Method identifier.
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    /// Whether the method expects a passcode in the validation payload.
    #[serde(default, deserialize_with = "nullable")]
    pub uses_passcode: bool,
    /// Human readable name.
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

/// Wrapping metadata of a response-wrapped [`Secret`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretWrapInfo {
    /// The single-use wrapping token.
    #[serde(default, deserialize_with = "nullable")]
    pub token: String,
    /// Accessor of the wrapping token.
    #[serde(default, deserialize_with = "nullable")]
    pub accessor: String,
    /// Wrapping TTL in seconds.
    #[serde(default, deserialize_with = "nullable")]
    pub ttl: u64,
    /// When the wrapping token was created.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub creation_time: Option<OffsetDateTime>,
    /// Path of the request whose response was wrapped.
    #[serde(default, deserialize_with = "nullable")]
    pub creation_path: String,
    /// Accessor of the wrapped token, for wrapped token creations.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub wrapped_accessor: String,
}

impl Secret {
    /// Decodes a response body into a [`Secret`].
    ///
    /// An empty body yields `Ok(None)`. A JSON object that names none of the
    /// envelope fields is treated as a raw object:
    /// - `{"errors": [...]}` alone yields `Ok(None)`,
    /// - errors next to other keys yield an error built from the error strings,
    /// - any other keys become [`Secret::data`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Decode`] if the body is not valid JSON for the
    /// envelope.
    pub fn parse(body: &[u8]) -> Result<Option<Self>, ClientError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let value: Value = serde_json::from_slice(body)?;
        if value.is_null() {
            return Ok(None);
        }
        let mut secret = Secret::deserialize(&value)?;
        if secret != Secret::default() {
            return Ok(Some(secret));
        }

        let Value::Object(raw) = value else {
            return Ok(Some(secret));
        };
        if ENVELOPE_FIELDS.iter().any(|field| raw.contains_key(*field)) {
            return Ok(Some(secret));
        }
        if let Some(errors) = raw.get("errors") {
            if raw.len() == 1 {
                return Ok(None);
            }
            let errors: Vec<String> = Vec::deserialize(errors)?;
            return Err(ClientError::schema(errors.join(" ")));
        }
        if !raw.is_empty() {
            secret.data = Some(raw);
        }
        Ok(Some(secret))
    }

    /// Returns the pending MFA requirement of a login response, if any.
    pub fn mfa_requirement(&self) -> Option<&MfaRequirement> {
        self.auth.as_ref()?.mfa_requirement.as_ref()
    }

    /// Returns `true` if the envelope carries neither data nor warnings.
    pub(crate) fn is_empty_payload(&self) -> bool {
        self.data.as_ref().map_or(true, Map::is_empty)
            && self.warnings.as_ref().map_or(true, Vec::is_empty)
    }
}

/// Deserializes `null` as the type's default value.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(n: &u64) -> bool {
    *n == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const WRAPPED_RESPONSE: &str = r#"{
        "lease_id": "foo",
        "renewable": true,
        "lease_duration": 10,
        "data": {
            "key": "value"
        },
        "warnings": [
            "a warning!"
        ],
        "wrap_info": {
            "token": "token",
            "accessor": "accessor",
            "ttl": 60,
            "creation_time": "2016-06-07T15:52:10-04:00",
            "wrapped_accessor": "abcd1234"
        }
    }"#;

    #[test]
    fn test_parse_secret_envelope() {
        let secret = Secret::parse(WRAPPED_RESPONSE.as_bytes()).unwrap().unwrap();

        assert_eq!(secret.lease_id, "foo");
        assert!(secret.renewable);
        assert_eq!(secret.lease_duration, 10);
        assert_eq!(secret.data.as_ref().unwrap()["key"], "value");
        assert_eq!(secret.warnings.as_deref(), Some(&["a warning!".to_string()][..]));

        let wrap = secret.wrap_info.as_ref().unwrap();
        assert_eq!(wrap.token, "token");
        assert_eq!(wrap.accessor, "accessor");
        assert_eq!(wrap.ttl, 60);
        assert_eq!(wrap.creation_time, Some(datetime!(2016-06-07 15:52:10 -04:00)));
        assert_eq!(wrap.wrapped_accessor, "abcd1234");
    }

    #[test]
    fn test_parse_empty_body_is_none() {
        assert!(Secret::parse(b"").unwrap().is_none());
        assert!(Secret::parse(b"  \n").unwrap().is_none());
        assert!(Secret::parse(b"null").unwrap().is_none());
    }

    #[test]
    fn test_parse_errors_only_is_none() {
        assert!(Secret::parse(br#"{"errors":[]}"#).unwrap().is_none());
    }

    #[test]
    fn test_parse_errors_with_raw_data_is_error() {
        let err = Secret::parse(br#"{"errors":["one","two"],"extra":1}"#).unwrap_err();
        assert!(matches!(err, ClientError::Schema(ref msg) if msg == "one two"));
    }

    #[test]
    fn test_parse_raw_object_becomes_data() {
        let secret = Secret::parse(br#"{"initialized":true,"sealed":false}"#)
            .unwrap()
            .unwrap();
        let data = secret.data.unwrap();
        assert_eq!(data["initialized"], true);
        assert_eq!(data["sealed"], false);
    }

    #[test]
    fn test_parse_tolerates_null_containers() {
        let body = br#"{"request_id":"r","lease_id":"","renewable":false,"lease_duration":0,
            "data":null,"wrap_info":null,"warnings":null,
            "auth":{"client_token":"t","policies":null,"metadata":null,"mfa_requirement":null}}"#;
        let secret = Secret::parse(body).unwrap().unwrap();
        let auth = secret.auth.unwrap();
        assert_eq!(auth.client_token, "t");
        assert!(auth.policies.is_empty());
        assert!(auth.metadata.is_empty());
    }

    #[test]
    fn test_numbers_survive_round_trip() {
        let body = br#"{"request_id":"r","lease_id":"","renewable":false,"lease_duration":2764800,
            "data":{"big":123456789012345678901234567890,"float":1.10,"version":7},
            "wrap_info":null,"warnings":null,"auth":null,"mount_type":"kv"}"#;
        let secret = Secret::parse(body).unwrap().unwrap();
        let encoded = serde_json::to_vec(&secret).unwrap();
        let text = String::from_utf8(encoded.clone()).unwrap();
        assert!(text.contains("123456789012345678901234567890"));
        assert!(text.contains("1.10"));

        let decoded = Secret::parse(&encoded).unwrap().unwrap();
        assert_eq!(decoded, secret);
    }

    fn round_trip(secret: &Secret) -> Secret {
        let encoded = serde_json::to_vec(secret).unwrap();
        Secret::parse(&encoded).unwrap().unwrap()
    }

    #[test]
    fn test_empty_object_round_trip() {
        let secret = Secret::parse(b"{}").unwrap().unwrap();
        assert_eq!(secret, Secret::default());
        assert_eq!(round_trip(&secret), secret);
        assert!(round_trip(&secret).data.is_none());
    }

    #[test]
    fn test_warnings_only_round_trip() {
        let secret = Secret::parse(br#"{"warnings":["deprecated endpoint"]}"#)
            .unwrap()
            .unwrap();
        assert!(secret.data.is_none());
        assert_eq!(round_trip(&secret), secret);
    }

    #[test]
    fn test_default_envelope_fields_are_not_raw_data() {
        let body = br#"{"request_id":"","lease_id":"","renewable":false,"lease_duration":0,"data":null}"#;
        let secret = Secret::parse(body).unwrap().unwrap();
        assert_eq!(secret, Secret::default());
    }

    #[test]
    fn test_mfa_requirement_is_decoded() {
        let body = br#"{"auth":{"client_token":"","mfa_requirement":{
            "mfa_request_id":"req-1",
            "mfa_constraints":{"enforcement":{"any":[
                {"type":"totp","id":"m-1","uses_passcode":true,"name":"phone"}]}}}}}"#;
        let secret = Secret::parse(body).unwrap().unwrap();
        let req = secret.mfa_requirement().unwrap();
        assert_eq!(req.mfa_request_id, "req-1");
        let method = &req.mfa_constraints["enforcement"].any[0];
        assert_eq!(method.method_type, "totp");
        assert!(method.uses_passcode);
    }

    #[test]
    fn test_empty_payload_detection() {
        assert!(Secret::default().is_empty_payload());
        let secret = Secret {
            warnings: Some(vec!["w".into()]),
            ..Secret::default()
        };
        assert!(!secret.is_empty_payload());
    }
}
