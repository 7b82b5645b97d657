use super::Sys;
use crate::error::ClientError;
use crate::secret::Secret;
use http::Method;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Serialize)]
struct ValidateBody<'a> {
    mfa_request_id: &'a str,
    mfa_payload: &'a HashMap<String, Vec<String>>,
}

impl Sys<'_> {
    /// Completes a two-phase MFA login.
    ///
    /// `payload` maps each MFA method id to its passcodes (empty for push
    /// based methods). The returned secret carries the login token.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn mfa_validate(
        &self,
        mfa_request_id: &str,
        payload: &HashMap<String, Vec<String>>,
    ) -> Result<Option<Secret>, ClientError> {
        let req = self.request_with_body(
            Method::PUT,
            "sys/mfa/validate",
            &ValidateBody {
                mfa_request_id,
                mfa_payload: payload,
            },
        )?;
        self.send_secret(req).await
    }
}
