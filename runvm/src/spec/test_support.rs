//! Builders shared by tests across the crate.

use super::{ContainerIdentity, MergedSpecification, RuntimeSpec};
use crate::runtime::RuntimeOptions;
use oci_spec::runtime::Spec;
use serde_json::Value;
use std::path::Path;

/// OCI config whose process runs `args`.
pub fn config_running(args: &[&str]) -> Spec {
    let mut value = serde_json::to_value(Spec::default()).unwrap();
    value["process"]["args"] = Value::from(args.to_vec());
    value["process"]["terminal"] = Value::Bool(false);
    value["process"]["env"] = Value::from(vec!["PATH=/usr/sbin:/usr/bin:/sbin:/bin"]);
    serde_json::from_value(value).unwrap()
}

/// Start request for the host process driver.
pub fn merged_running(name: &str, root: &Path, bundle: &Path, args: &[&str]) -> MergedSpecification {
    MergedSpecification {
        identity: ContainerIdentity::new(name, root.to_path_buf(), bundle.to_path_buf()).unwrap(),
        runtime_options: RuntimeOptions {
            driver: "process".into(),
            ..Default::default()
        },
        config: config_running(args),
        runtime: RuntimeSpec::default(),
    }
}

/// Write `config.json` for `args` into `bundle`.
pub fn write_bundle(bundle: &Path, args: &[&str]) {
    let bytes = serde_json::to_vec(&config_running(args)).unwrap();
    std::fs::write(bundle.join("config.json"), bytes).unwrap();
}
