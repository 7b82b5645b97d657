use super::Sys;
use crate::error::ClientError;
use http::Method;
use serde::{Deserialize, Serialize};

/// Registration of a plugin runtime.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PluginRuntimeInput {
    /// Runtime name.
    #[serde(skip)]
    pub name: String,
    /// Runtime type; only `container` is known to the server.
    #[serde(skip)]
    pub runtime_type: String,
    /// OCI runtime binary, e.g. `runsc`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub oci_runtime: String,
    /// Parent cgroup for plugin containers.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cgroup_parent: String,
    /// CPU limit in nanoseconds per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_nanos: Option<i64>,
    /// Memory limit in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_bytes: Option<i64>,
    /// Run containers rootless.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub rootless: bool,
}

/// A registered plugin runtime.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PluginRuntimeDetails {
    /// Runtime name.
    pub name: String,
    /// Runtime type.
    #[serde(rename = "type")]
    pub runtime_type: String,
    /// OCI runtime binary.
    pub oci_runtime: String,
    /// Parent cgroup.
    pub cgroup_parent: String,
    /// CPU limit in nanoseconds per second.
    pub cpu_nanos: i64,
    /// Memory limit in bytes.
    pub memory_bytes: i64,
    /// Whether containers run rootless.
    pub rootless: bool,
}

#[derive(Deserialize)]
struct RuntimeList {
    #[serde(default)]
    runtimes: Vec<PluginRuntimeDetails>,
}

fn runtime_path(runtime_type: &str, name: &str) -> String {
    format!("sys/plugins/runtimes/catalog/{runtime_type}/{name}")
}

impl Sys<'_> {
    /// Lists registered plugin runtimes.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn list_plugin_runtimes(&self) -> Result<Vec<PluginRuntimeDetails>, ClientError> {
        let list: RuntimeList = self
            .send_data(self.request(Method::GET, "sys/plugins/runtimes/catalog"))
            .await?;
        Ok(list.runtimes)
    }

    /// Returns plugin runtime `name` of type `runtime_type`.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn get_plugin_runtime(
        &self,
        runtime_type: &str,
        name: &str,
    ) -> Result<PluginRuntimeDetails, ClientError> {
        self.send_data(self.request(Method::GET, &runtime_path(runtime_type, name)))
            .await
    }

    /// Registers (or replaces) a plugin runtime.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn register_plugin_runtime(&self, input: &PluginRuntimeInput) -> Result<(), ClientError> {
        let path = runtime_path(&input.runtime_type, &input.name);
        let req = self.request_with_body(Method::PUT, &path, input)?;
        self.send_discard(req).await
    }

    /// Removes plugin runtime `name` of type `runtime_type`.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn deregister_plugin_runtime(&self, runtime_type: &str, name: &str) -> Result<(), ClientError> {
        self.send_discard(self.request(Method::DELETE, &runtime_path(runtime_type, name)))
            .await
    }
}
