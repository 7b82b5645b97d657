//! Sending a [`Request`]: retries, redirects, cookies and replication states.

use super::output::{curl_string, policy_string};
use super::request::Request;
use super::response::{check_status, Response};
use super::retry::{next_backoff, AttemptOutcome};
use super::Client;
use crate::constants::{AUTH_COOKIE_NAME, HEADER_INDEX};
use crate::context::Context;
use crate::error::ClientError;
use crate::prelude::{debug, warn};
use http::header::LOCATION;
use http::{HeaderMap, StatusCode};
use url::Url;

impl Client {
    /// Sends `req` with a background context.
    ///
    /// # Errors
    ///
    /// See [`Client::raw_request_with_context`].
    pub async fn raw_request(&self, req: Request) -> Result<Response, ClientError> {
        self.raw_request_with_context(&Context::background(), req)
            .await
    }

    /// Sends `req` through the pipeline.
    ///
    /// The namespace of this client is applied unless the request set its own.
    /// Idempotent requests with a replayable body are retried according to the
    /// retry policy; a single `301`/`302`/`307` is followed unless redirects are
    /// disabled. A `token` cookie in the response replaces the client token.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Cancelled`] / [`ClientError::DeadlineExceeded`] when
    ///   `ctx` ends first,
    /// - [`ClientError::Transport`] when no response was received,
    /// - [`ClientError::Response`] for a status of 400 or above,
    /// - [`ClientError::RedirectDowngrade`], [`ClientError::InvalidRedirect`] or
    ///   [`ClientError::BodyNotReplayable`] for a redirect that cannot be
    ///   followed,
    /// - [`ClientError::OutputCurlString`] / [`ClientError::OutputPolicy`] in
    ///   the dry-run modes.
    pub async fn raw_request_with_context(
        &self,
        ctx: &Context,
        mut req: Request,
    ) -> Result<Response, ClientError> {
        ctx.check()?;

        let (output_curl, output_policy) = {
            let state = self.read_state();
            req.namespace_or(state.namespace.clone());
            req.forwarding = state.forwarding;
            (state.output_curl, state.output_policy)
        };
        if self.shared.read_your_writes {
            req.replication_states = self.shared.replication.states();
        }

        if output_curl {
            let out = curl_string(&req, &req.header_map()?, &self.shared.curl_tls);
            self.write_state().last_output = Some(out.clone());
            return Err(ClientError::OutputCurlString(out));
        }
        if output_policy {
            let out = policy_string(&req);
            self.write_state().last_output = Some(out.clone());
            return Err(ClientError::OutputPolicy(out));
        }

        let headers = req.header_map()?;
        let mut redirected = false;
        loop {
            let resp = self.send_with_retries(ctx, &mut req, &headers).await?;
            self.observe(&resp);

            if redirected || self.shared.disable_redirects || !is_redirect(resp.status()) {
                return check_status(resp, req.wire_method().as_str(), req.namespace()).await;
            }

            let location = redirect_target(
                resp.url(),
                resp.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
                req.is_streaming(),
            )?;

            debug!(
                "Following redirect: status={}, to={}",
                resp.status().as_u16(),
                location
            );
            req.redirect_to(location);
            redirected = true;
        }
    }

    async fn send_with_retries(
        &self,
        ctx: &Context,
        req: &mut Request,
        headers: &HeaderMap,
    ) -> Result<reqwest::Response, ClientError> {
        let retry = self.shared.retry;
        let replayable = !req.is_streaming() && req.is_idempotent();
        let max_attempts = if replayable {
            retry.max_retries.saturating_add(1)
        } else {
            1
        };

        let mut backoff = retry.min_backoff;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let pending = req.build(&self.shared.http, headers.clone()).send();
            let outcome = ctx.run(async { Ok(pending.await) }).await?;

            let retryable = match &outcome {
                Ok(resp) => {
                    let status = resp.status();
                    self.shared
                        .retry_policy
                        .should_retry(&AttemptOutcome::Status(status))
                        || (self.shared.read_your_writes
                            && status == StatusCode::PRECONDITION_FAILED)
                }
                Err(err) => self
                    .shared
                    .retry_policy
                    .should_retry(&AttemptOutcome::Transport(err)),
            };

            if !retryable || attempt >= max_attempts {
                return outcome.map_err(|source| ClientError::Transport {
                    method: req.wire_method().to_string(),
                    url: req.wire_url().to_string(),
                    attempts: attempt,
                    source,
                });
            }

            match &outcome {
                Ok(resp) => warn!(
                    "Request failed; will retry: status={}, attempt={attempt}, backoff_ms={}",
                    resp.status().as_u16(),
                    backoff.as_millis()
                ),
                Err(e) => warn!(
                    "Request failed; will retry: error={e}, attempt={attempt}, backoff_ms={}",
                    backoff.as_millis()
                ),
            }
            drop(outcome);

            ctx.sleep(backoff).await?;
            backoff = next_backoff(backoff, retry.max_backoff);
        }
    }

    fn observe(&self, resp: &reqwest::Response) {
        if let Some(cookie) = resp.cookies().find(|c| c.name() == AUTH_COOKIE_NAME) {
            debug!("Adopting token from response cookie");
            self.set_token(cookie.value());
        }

        if self.shared.read_your_writes {
            if let Some(state) = resp.headers().get(HEADER_INDEX).and_then(|v| v.to_str().ok()) {
                self.shared.replication.record(state);
                debug!(
                    "Recorded replication state: known_states={}",
                    self.shared.replication.states().len()
                );
            }
        }
    }
}

/// Resolves the `Location` of a redirect answered for `from`.
fn redirect_target(
    from: &Url,
    location: Option<&str>,
    streaming: bool,
) -> Result<Url, ClientError> {
    let location = location
        .and_then(|loc| from.join(loc).ok())
        .ok_or_else(|| ClientError::InvalidRedirect(from.to_string()))?;
    if from.scheme() == "https" && location.scheme() != "https" {
        return Err(ClientError::RedirectDowngrade {
            from: from.to_string(),
            to: location.to_string(),
        });
    }
    if streaming {
        return Err(ClientError::BodyNotReplayable(from.to_string()));
    }
    Ok(location)
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::TEMPORARY_REDIRECT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_redirect_relative_location() {
        let from = url("https://vault-a:8200/v1/secret/foo");
        let to = redirect_target(&from, Some("/v1/secret/bar"), false).unwrap();
        assert_eq!(to.as_str(), "https://vault-a:8200/v1/secret/bar");
    }

    #[test]
    fn test_redirect_refuses_https_downgrade() {
        let from = url("https://vault-a:8200/v1/sys/leader");
        let err = redirect_target(&from, Some("http://vault-b:8200/v1/sys/leader"), false)
            .unwrap_err();
        assert!(matches!(err, ClientError::RedirectDowngrade { .. }));
    }

    #[test]
    fn test_redirect_allows_http_to_https() {
        let from = url("http://vault-a:8200/v1/sys/leader");
        let to = redirect_target(&from, Some("https://vault-b:8200/v1/sys/leader"), false).unwrap();
        assert_eq!(to.scheme(), "https");
    }

    #[test]
    fn test_redirect_without_location() {
        let from = url("https://vault-a:8200/v1/sys/leader");
        let err = redirect_target(&from, None, false).unwrap_err();
        assert!(matches!(err, ClientError::InvalidRedirect(_)));
    }

    #[test]
    fn test_redirect_with_streaming_body() {
        let from = url("https://vault-a:8200/v1/sys/storage/raft/snapshot");
        let err = redirect_target(&from, Some("https://vault-b:8200/v1/sys/storage/raft/snapshot"), true)
            .unwrap_err();
        assert!(matches!(err, ClientError::BodyNotReplayable(_)));
    }
}
