use crate::spec::MergedSpecification;
use runvm_shared::{RunvmError, RunvmResult};

/// Refuse specs that ask to join an existing namespace.
///
/// Joining is recognised but not supported, so the refusal is
/// `NotImplemented` (exit status 0) rather than a failure. Both the
/// runtime spec and the base config's `linux.namespaces` are inspected.
pub fn check_namespaces(spec: &MergedSpecification) -> RunvmResult<()> {
    for ns in &spec.runtime.linux.namespaces {
        if let Some(path) = ns.path.as_deref()
            && !path.is_empty()
        {
            return Err(declined(&ns.kind, path));
        }
    }

    let base = spec
        .config
        .linux()
        .as_ref()
        .and_then(|linux| linux.namespaces().as_ref());
    for ns in base.into_iter().flatten() {
        if let Some(path) = ns.path()
            && !path.as_os_str().is_empty()
        {
            return Err(declined(
                &format!("{:?}", ns.typ()),
                &path.display().to_string(),
            ));
        }
    }

    Ok(())
}

fn declined(kind: &str, path: &str) -> RunvmError {
    tracing::warn!(namespace = %kind, path = %path, "Joining an existing namespace is not supported yet");
    RunvmError::NotImplemented(format!(
        "joining existing {} namespace at {} is not supported yet",
        kind, path
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeOptions;
    use crate::spec::{ContainerIdentity, NamespaceEntry, RuntimeSpec};
    use oci_spec::runtime::Spec;

    fn merged(runtime: RuntimeSpec, config: Spec) -> MergedSpecification {
        MergedSpecification {
            identity: ContainerIdentity::new("c1", "/r".into(), "/b".into()).unwrap(),
            runtime_options: RuntimeOptions::default(),
            config,
            runtime,
        }
    }

    fn config_without_namespaces() -> Spec {
        let mut value = serde_json::to_value(Spec::default()).unwrap();
        value["linux"]["namespaces"] = serde_json::json!([{"type": "pid"}, {"type": "mount"}]);
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_fresh_namespaces_pass() {
        let mut runtime = RuntimeSpec::default();
        runtime.linux.namespaces = vec![
            NamespaceEntry { kind: "pid".into(), path: None },
            NamespaceEntry { kind: "ipc".into(), path: Some(String::new()) },
        ];
        assert!(check_namespaces(&merged(runtime, config_without_namespaces())).is_ok());
    }

    #[test]
    fn test_runtime_join_path_is_declined() {
        let mut runtime = RuntimeSpec::default();
        runtime.linux.namespaces = vec![
            NamespaceEntry { kind: "pid".into(), path: None },
            NamespaceEntry {
                kind: "network".into(),
                path: Some("/proc/1234/ns/net".into()),
            },
        ];
        let err = check_namespaces(&merged(runtime, config_without_namespaces())).unwrap_err();
        assert!(matches!(err, RunvmError::NotImplemented(_)));
        assert_eq!(err.exit_status(), 0);
    }

    #[test]
    fn test_base_config_join_path_is_declined() {
        let mut value = serde_json::to_value(Spec::default()).unwrap();
        value["linux"]["namespaces"] =
            serde_json::json!([{"type": "network", "path": "/proc/1/ns/net"}]);
        let config: Spec = serde_json::from_value(value).unwrap();

        let err = check_namespaces(&merged(RuntimeSpec::default(), config)).unwrap_err();
        assert!(matches!(err, RunvmError::NotImplemented(_)));
    }
}
