//! Dry-run renderings of a request: a `curl` command or a sample policy.

use super::request::{Request, LIST};
use crate::constants::HEADER_TOKEN;
use crate::sudo_paths::is_sudo_path;
use http::{HeaderMap, Method};
use std::fmt::Write as _;
use std::path::PathBuf;

const TOKEN_PLACEHOLDER: &str = "$(vault print token)";

/// TLS material that shows up as `curl` flags.
#[derive(Clone, Debug, Default)]
pub(crate) struct CurlTlsFlags {
    pub(crate) insecure: bool,
    pub(crate) ca_cert: Option<PathBuf>,
    pub(crate) ca_path: Option<PathBuf>,
    pub(crate) client_cert: Option<PathBuf>,
    pub(crate) client_key: Option<PathBuf>,
}

/// Renders `req` as an equivalent `curl` command line.
///
/// The token is never printed; it is replaced with a shell substitution.
pub(crate) fn curl_string(req: &Request, headers: &HeaderMap, tls: &CurlTlsFlags) -> String {
    let mut out = String::from("curl ");
    if tls.insecure {
        out.push_str("--insecure ");
    }
    let method = req.wire_method();
    if method != Method::GET {
        let _ = write!(out, "-X {method} ");
    }
    for (flag, path) in [
        ("--cacert", &tls.ca_cert),
        ("--capath", &tls.ca_path),
        ("--cert", &tls.client_cert),
        ("--key", &tls.client_key),
    ] {
        if let Some(path) = path {
            let _ = write!(out, "{flag} '{}' ", path.display());
        }
    }

    let mut names: Vec<_> = headers.keys().collect();
    names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    for name in names {
        for value in headers.get_all(name) {
            let value = if name.as_str() == HEADER_TOKEN {
                TOKEN_PLACEHOLDER.into()
            } else {
                String::from_utf8_lossy(value.as_bytes())
            };
            let _ = write!(out, "-H \"{name}: {value}\" ");
        }
    }

    if let Some(body) = req.body_bytes().filter(|b| !b.is_empty()) {
        let body = String::from_utf8_lossy(body).replace('\'', "'\"'\"'");
        let _ = write!(out, "-d '{body}' ");
    }

    out.push_str(req.wire_url().as_str());
    out
}

/// Renders a policy stanza granting exactly what `req` needs.
pub(crate) fn policy_string(req: &Request) -> String {
    let full = req.url().path();
    let path = full
        .split_once("/v1/")
        .map_or(full.trim_start_matches('/'), |(_, rel)| rel);

    let mut capabilities = capabilities_for(req);
    if is_sudo_path(&format!("/{path}")) {
        capabilities.push("sudo");
    }
    let quoted = capabilities
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");

    format!("path \"{path}\" {{\n  capabilities = [{quoted}]\n}}\n")
}

fn capabilities_for(req: &Request) -> Vec<&'static str> {
    let listing = *req.method() == *LIST
        || req.params().iter().any(|(k, v)| k == "list" && v == "true");
    if listing {
        return vec!["list"];
    }
    match *req.method() {
        Method::GET | Method::HEAD => vec!["read"],
        Method::POST | Method::PUT => vec!["create", "update"],
        Method::PATCH => vec!["patch"],
        Method::DELETE => vec!["delete"],
        _ => vec!["read"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn request(method: Method, path: &str) -> Request {
        let url = Url::parse(&format!("https://127.0.0.1:8200/v1/{path}")).unwrap();
        let mut req = Request::new(method, url, HeaderMap::new());
        req.set_token("s.secret");
        req
    }

    #[test]
    fn test_curl_hides_token_and_quotes_body() {
        let mut req = request(Method::PUT, "secret/foo");
        req.set_json_body(&serde_json::json!({"it's": "ok"})).unwrap();
        let headers = req.header_map().unwrap();
        let tls = CurlTlsFlags {
            insecure: true,
            ca_cert: Some("/etc/ca.pem".into()),
            ..CurlTlsFlags::default()
        };

        let out = curl_string(&req, &headers, &tls);
        assert!(out.starts_with("curl --insecure -X PUT --cacert '/etc/ca.pem' "));
        assert!(out.contains("-H \"x-vault-token: $(vault print token)\""));
        assert!(!out.contains("s.secret"));
        assert!(out.contains(r#"-d '{"it'"'"'s":"ok"}'"#));
        assert!(out.ends_with("https://127.0.0.1:8200/v1/secret/foo"));
    }

    #[test]
    fn test_curl_omits_method_for_get() {
        let req = request(Method::GET, "sys/health");
        let out = curl_string(&req, &req.header_map().unwrap(), &CurlTlsFlags::default());
        assert!(out.starts_with("curl -H "));
        assert!(!out.contains("-X"));
    }

    #[test]
    fn test_policy_for_write() {
        let req = request(Method::POST, "secret/data/app");
        assert_eq!(
            policy_string(&req),
            "path \"secret/data/app\" {\n  capabilities = [\"create\", \"update\"]\n}\n"
        );
    }

    #[test]
    fn test_policy_for_list_and_sudo() {
        let req = request(LIST.clone(), "sys/policy");
        assert!(policy_string(&req).contains("capabilities = [\"list\"]"));

        let req = request(Method::GET, "sys/audit");
        assert!(policy_string(&req).contains("capabilities = [\"read\", \"sudo\"]"));
    }
}
