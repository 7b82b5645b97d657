use super::Sys;
use crate::client::LIST;
use crate::error::ClientError;
use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a catalog plugin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    /// Auth method plugin.
    Auth,
    /// Database plugin.
    Database,
    /// Secrets engine plugin.
    Secret,
}

impl PluginType {
    /// Path segment of this kind in the catalog.
    pub fn as_str(self) -> &'static str {
        match self {
            PluginType::Auth => "auth",
            PluginType::Database => "database",
            PluginType::Secret => "secret",
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog listing, grouped by kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PluginsList {
    /// Auth method plugin names.
    pub auth: Vec<String>,
    /// Database plugin names.
    pub database: Vec<String>,
    /// Secrets engine plugin names.
    pub secret: Vec<String>,
    /// Every registered plugin with its details.
    pub detailed: Vec<PluginDetails>,
}

/// A registered plugin.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PluginDetails {
    /// Plugin name.
    pub name: String,
    /// Plugin kind, as reported by the server.
    #[serde(rename = "type")]
    pub plugin_type: String,
    /// Plugin version.
    pub version: String,
    /// Whether the plugin ships with the server.
    pub builtin: bool,
    /// Deprecation status of a builtin plugin.
    pub deprecation_status: String,
    /// Command run to start the plugin.
    pub command: String,
    /// Arguments passed to the command.
    pub args: Vec<String>,
    /// SHA-256 of the plugin binary or image.
    pub sha256: String,
    /// OCI image, for containerized plugins.
    pub oci_image: String,
    /// Plugin runtime, for containerized plugins.
    pub runtime: String,
}

/// Registration of a plugin in the catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PluginRegisterInput {
    /// Plugin name.
    #[serde(skip)]
    pub name: String,
    /// Plugin kind.
    #[serde(skip)]
    pub plugin_type: Option<PluginType>,
    /// Plugin version.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// SHA-256 of the plugin binary or image, hex encoded.
    pub sha256: String,
    /// Command run to start the plugin.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub command: String,
    /// Arguments passed to the command.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// `KEY=value` environment entries.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    /// OCI image, for containerized plugins.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub oci_image: String,
    /// Plugin runtime, for containerized plugins.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub runtime: String,
}

#[derive(Deserialize)]
struct KeyList {
    #[serde(default)]
    keys: Vec<String>,
}

fn catalog_path(plugin_type: Option<PluginType>, name: &str) -> String {
    match plugin_type {
        Some(t) => format!("sys/plugins/catalog/{t}/{name}"),
        None => format!("sys/plugins/catalog/{name}"),
    }
}

impl Sys<'_> {
    /// Lists every plugin in the catalog.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn list_plugins(&self) -> Result<PluginsList, ClientError> {
        self.send_data(self.request(Method::GET, "sys/plugins/catalog"))
            .await
    }

    /// Lists the names of plugins of one kind.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn list_plugins_of_type(&self, plugin_type: PluginType) -> Result<Vec<String>, ClientError> {
        let req = self.request(LIST.clone(), &format!("sys/plugins/catalog/{plugin_type}"));
        let keys: KeyList = self.send_data(req).await?;
        Ok(keys.keys)
    }

    /// Returns plugin `name` of kind `plugin_type`, optionally pinned to `version`.
    ///
    /// # Errors
    ///
    /// Any pipeline or decoding error.
    pub async fn get_plugin(
        &self,
        plugin_type: PluginType,
        name: &str,
        version: Option<&str>,
    ) -> Result<PluginDetails, ClientError> {
        let mut req = self.request(Method::GET, &catalog_path(Some(plugin_type), name));
        if let Some(version) = version {
            req.set_param("version", version);
        }
        self.send_data(req).await
    }

    /// Registers (or replaces) a plugin.
    ///
    /// Without a plugin type the legacy, untyped catalog path is used.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn register_plugin(&self, input: &PluginRegisterInput) -> Result<(), ClientError> {
        let path = catalog_path(input.plugin_type, &input.name);
        let req = self.request_with_body(Method::PUT, &path, input)?;
        self.send_discard(req).await
    }

    /// Removes plugin `name` (one `version` of it, when given) from the catalog.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn deregister_plugin(
        &self,
        plugin_type: PluginType,
        name: &str,
        version: Option<&str>,
    ) -> Result<(), ClientError> {
        let mut req = self.request(Method::DELETE, &catalog_path(Some(plugin_type), name));
        if let Some(version) = version {
            req.set_param("version", version);
        }
        self.send_discard(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_body_leaves_path_fields_out() {
        let input = PluginRegisterInput {
            name: "my-plugin".into(),
            plugin_type: Some(PluginType::Secret),
            sha256: "abcd".into(),
            command: "my-plugin".into(),
            ..PluginRegisterInput::default()
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({"sha256": "abcd", "command": "my-plugin"})
        );
        assert_eq!(
            catalog_path(input.plugin_type, &input.name),
            "sys/plugins/catalog/secret/my-plugin"
        );
    }

    #[test]
    fn test_listing_decodes_detailed_entries() {
        let list: PluginsList = serde_json::from_value(json!({
            "auth": ["approle"],
            "detailed": [{"name": "approle", "type": "auth", "builtin": true, "version": "v1.15.0+builtin"}]
        }))
        .unwrap();
        assert_eq!(list.auth, vec!["approle"]);
        assert_eq!(list.detailed[0].plugin_type, "auth");
        assert!(list.detailed[0].builtin);
    }
}
