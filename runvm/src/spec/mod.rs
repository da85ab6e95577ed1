//! Container specification handed to the supervisor.
//!
//! The request body is an explicit composition of two independently
//! deserialized documents: the portable OCI config (`config.json`) and the
//! platform runtime config (`runtime.json`). Neither is flattened into the
//! other.

mod loader;
#[cfg(test)]
pub(crate) mod test_support;

pub use loader::{StartConfigInput, load_start_config};

use crate::runtime::RuntimeOptions;
use oci_spec::runtime::Spec;
use runvm_shared::{RunvmError, RunvmResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Who the container is and where it lives. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerIdentity {
    name: String,
    root: PathBuf,
    bundle_path: PathBuf,
}

impl ContainerIdentity {
    /// Build an identity. `name` must be a non-empty single path component.
    pub fn new(name: impl Into<String>, root: PathBuf, bundle_path: PathBuf) -> RunvmResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(RunvmError::Config("Please specify container ID".into()));
        }
        if name == "." || name == ".." || name.contains('/') || name.contains('\0') {
            return Err(RunvmError::Config(format!(
                "Invalid container ID '{}': must be a single path component",
                name
            )));
        }
        Ok(Self {
            name,
            root,
            bundle_path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn bundle_path(&self) -> &PathBuf {
        &self.bundle_path
    }
}

/// One entry of `linux.namespaces` in `runtime.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceEntry {
    #[serde(rename = "type")]
    pub kind: String,
    /// Join an existing namespace at this path instead of creating one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeLinux {
    #[serde(default)]
    pub namespaces: Vec<NamespaceEntry>,
    /// Everything else is forwarded to the supervisor untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Platform runtime config (`runtime.json`). A missing file means default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSpec {
    #[serde(default)]
    pub linux: RuntimeLinux,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `STARTCONTAINER` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedSpecification {
    pub identity: ContainerIdentity,
    pub runtime_options: RuntimeOptions,
    pub config: Spec,
    pub runtime: RuntimeSpec,
}

impl MergedSpecification {
    pub fn to_json(&self) -> RunvmResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| RunvmError::Internal(format!("Failed to serialize start request: {}", e)))
    }

    pub fn from_json(bytes: &[u8]) -> RunvmResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| RunvmError::Config(format!("Malformed start request: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rejects_empty_name() {
        let err = ContainerIdentity::new("", "/run/runvm".into(), "/bundle".into()).unwrap_err();
        assert!(matches!(err, RunvmError::Config(_)));
    }

    #[test]
    fn test_identity_rejects_path_like_names() {
        for name in ["..", ".", "a/b"] {
            assert!(ContainerIdentity::new(name, "/r".into(), "/b".into()).is_err());
        }
        let id = ContainerIdentity::new("c1", "/r".into(), "/b".into()).unwrap();
        assert_eq!(id.name(), "c1");
    }

    #[test]
    fn test_runtime_spec_keeps_unknown_fields() {
        let json = r#"{
            "linux": {
                "namespaces": [{"type": "pid"}, {"type": "network", "path": "/proc/1/ns/net"}],
                "resources": {"memory": {"limit": 1024}}
            },
            "hooks": {}
        }"#;
        let spec: RuntimeSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.linux.namespaces.len(), 2);
        assert_eq!(spec.linux.namespaces[0].path, None);
        assert_eq!(
            spec.linux.namespaces[1].path.as_deref(),
            Some("/proc/1/ns/net")
        );
        assert!(spec.linux.extra.contains_key("resources"));
        assert!(spec.extra.contains_key("hooks"));

        let back = serde_json::to_value(&spec).unwrap();
        assert_eq!(back["linux"]["resources"]["memory"]["limit"], 1024);
    }

    #[test]
    fn test_merged_specification_json_shape() {
        let merged = MergedSpecification {
            identity: ContainerIdentity::new("c1", "/run/runvm".into(), "/bundle".into()).unwrap(),
            runtime_options: RuntimeOptions {
                driver: "process".into(),
                ..Default::default()
            },
            config: Spec::default(),
            runtime: RuntimeSpec::default(),
        };

        let bytes = merged.to_json().unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["identity"]["name"], "c1");
        assert_eq!(value["identity"]["bundlePath"], "/bundle");
        assert_eq!(value["runtimeOptions"]["driver"], "process");
        assert!(value["config"].is_object());

        let parsed = MergedSpecification::from_json(&bytes).unwrap();
        assert_eq!(parsed.identity, merged.identity);
        assert_eq!(parsed.runtime, merged.runtime);
    }
}
