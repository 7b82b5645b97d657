use super::Sys;
use crate::error::ClientError;
use crate::logical::secret_in_not_found;
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct PolicyList {
    #[serde(default)]
    policies: Vec<String>,
}

#[derive(Deserialize)]
struct PolicyRules {
    #[serde(default)]
    rules: String,
}

#[derive(Serialize)]
struct PolicyBody<'a> {
    rules: &'a str,
}

impl Sys<'_> {
    /// Lists the names of all ACL policies.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn list_policies(&self) -> Result<Vec<String>, ClientError> {
        let list: PolicyList = self.send_data(self.request(Method::GET, "sys/policy")).await?;
        Ok(list.policies)
    }

    /// Returns the rules of policy `name`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error other than a `404`.
    pub async fn get_policy(&self, name: &str) -> Result<Option<String>, ClientError> {
        let secret = match self
            .send_secret(self.request(Method::GET, &format!("sys/policy/{name}")))
            .await
        {
            Ok(secret) => secret,
            Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => secret_in_not_found(&err)?,
            Err(err) => return Err(err),
        };
        match secret {
            Some(secret) if secret.data.is_some() => {
                Ok(Some(super::decode_data::<PolicyRules>(secret)?.rules))
            }
            _ => Ok(None),
        }
    }

    /// Creates or replaces policy `name`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn put_policy(&self, name: &str, rules: &str) -> Result<(), ClientError> {
        let req = self.request_with_body(
            Method::PUT,
            &format!("sys/policy/{name}"),
            &PolicyBody { rules },
        )?;
        self.send_discard(req).await
    }

    /// Deletes policy `name`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn delete_policy(&self, name: &str) -> Result<(), ClientError> {
        self.send_discard(self.request(Method::DELETE, &format!("sys/policy/{name}")))
            .await
    }
}
