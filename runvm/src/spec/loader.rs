//! Assemble a [`MergedSpecification`] from CLI input and spec files.

use super::{ContainerIdentity, MergedSpecification, RuntimeSpec};
use crate::runtime::RuntimeOptions;
use oci_spec::runtime::Spec;
use runvm_shared::{RunvmError, RunvmResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Raw inputs for `start`, as collected by the CLI.
#[derive(Debug, Clone)]
pub struct StartConfigInput {
    pub name: String,
    pub root: PathBuf,
    pub options: RuntimeOptions,
    pub config_file: PathBuf,
    pub runtime_file: PathBuf,
    /// Bundle directory. `None` means the current working directory.
    pub bundle_path: Option<PathBuf>,
}

/// Load and merge the start configuration.
///
/// The container ID is checked before anything touches the filesystem.
/// Relative spec paths resolve against the bundle directory. A missing
/// runtime file yields the default runtime spec; any other stat failure is
/// fatal.
pub fn load_start_config(input: StartConfigInput) -> RunvmResult<MergedSpecification> {
    if input.name.is_empty() {
        return Err(RunvmError::Config("Please specify container ID".into()));
    }

    let bundle_path = match input.bundle_path {
        Some(path) => path,
        None => std::env::current_dir().map_err(|e| {
            RunvmError::Config(format!("Failed to resolve working directory: {}", e))
        })?,
    };

    let identity = ContainerIdentity::new(input.name, input.root, bundle_path.clone())?;

    let config_file = resolve(&bundle_path, &input.config_file);
    let runtime_file = resolve(&bundle_path, &input.runtime_file);

    let config_data = match std::fs::read(&config_file) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(RunvmError::Config(format!(
                "Config file {} not found. Specify --config-file or put config.json under the bundle directory",
                config_file.display()
            )));
        }
        Err(e) => {
            return Err(RunvmError::Config(format!(
                "Failed to read {}: {}",
                config_file.display(),
                e
            )));
        }
    };

    let runtime_data = match std::fs::metadata(&runtime_file) {
        Ok(_) => Some(std::fs::read(&runtime_file).map_err(|e| {
            RunvmError::Config(format!(
                "Failed to read {}: {}",
                runtime_file.display(),
                e
            ))
        })?),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(
                path = %runtime_file.display(),
                "Runtime file absent, using default runtime spec"
            );
            None
        }
        Err(e) => {
            return Err(RunvmError::Config(format!(
                "Failed to stat {}: {}",
                runtime_file.display(),
                e
            )));
        }
    };

    let config: Spec = serde_json::from_slice(&config_data).map_err(|e| {
        RunvmError::Config(format!("Malformed {}: {}", config_file.display(), e))
    })?;

    let runtime = match runtime_data {
        Some(data) => serde_json::from_slice::<RuntimeSpec>(&data).map_err(|e| {
            RunvmError::Config(format!("Malformed {}: {}", runtime_file.display(), e))
        })?,
        None => RuntimeSpec::default(),
    };

    Ok(MergedSpecification {
        identity,
        runtime_options: input.options,
        config,
        runtime,
    })
}

fn resolve(bundle: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        bundle.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_default_config(dir: &Path) {
        let bytes = serde_json::to_vec(&Spec::default()).unwrap();
        std::fs::write(dir.join("config.json"), bytes).unwrap();
    }

    fn input(name: &str, bundle: &Path) -> StartConfigInput {
        StartConfigInput {
            name: name.to_string(),
            root: bundle.join("state"),
            options: RuntimeOptions {
                driver: "process".into(),
                ..Default::default()
            },
            config_file: PathBuf::from("config.json"),
            runtime_file: PathBuf::from("runtime.json"),
            bundle_path: Some(bundle.to_path_buf()),
        }
    }

    #[test]
    fn test_empty_name_fails_regardless_of_files() {
        let temp = TempDir::new().unwrap();
        write_default_config(temp.path());
        let err = load_start_config(input("", temp.path())).unwrap_err();
        assert!(matches!(err, RunvmError::Config(_)));

        // still a config error when nothing else is valid either
        let mut bad = input("", Path::new("/nonexistent"));
        bad.config_file = PathBuf::from("/nonexistent/config.json");
        assert!(matches!(
            load_start_config(bad).unwrap_err(),
            RunvmError::Config(_)
        ));
    }

    #[test]
    fn test_missing_runtime_file_defaults() {
        let temp = TempDir::new().unwrap();
        write_default_config(temp.path());

        let merged = load_start_config(input("c1", temp.path())).unwrap();
        assert_eq!(merged.identity.name(), "c1");
        assert_eq!(merged.identity.bundle_path(), &temp.path().to_path_buf());
        assert_eq!(merged.runtime, RuntimeSpec::default());
        assert_eq!(merged.runtime_options.driver, "process");
    }

    #[test]
    fn test_runtime_file_is_parsed_when_present() {
        let temp = TempDir::new().unwrap();
        write_default_config(temp.path());
        std::fs::write(
            temp.path().join("runtime.json"),
            r#"{"linux": {"namespaces": [{"type": "ipc"}]}}"#,
        )
        .unwrap();

        let merged = load_start_config(input("c1", temp.path())).unwrap();
        assert_eq!(merged.runtime.linux.namespaces.len(), 1);
        assert_eq!(merged.runtime.linux.namespaces[0].kind, "ipc");
    }

    #[test]
    fn test_missing_config_file_is_config_error() {
        let temp = TempDir::new().unwrap();
        let err = load_start_config(input("c1", temp.path())).unwrap_err();
        match err {
            RunvmError::Config(msg) => assert!(msg.contains("not found")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_files_are_config_errors() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.json"), b"{not json").unwrap();
        assert!(matches!(
            load_start_config(input("c1", temp.path())).unwrap_err(),
            RunvmError::Config(_)
        ));

        write_default_config(temp.path());
        std::fs::write(temp.path().join("runtime.json"), b"[1, 2").unwrap();
        assert!(matches!(
            load_start_config(input("c1", temp.path())).unwrap_err(),
            RunvmError::Config(_)
        ));
    }

    #[test]
    fn test_runtime_path_that_is_a_directory_fails_read() {
        let temp = TempDir::new().unwrap();
        write_default_config(temp.path());
        std::fs::create_dir(temp.path().join("runtime.json")).unwrap();
        assert!(load_start_config(input("c1", temp.path())).is_err());
    }
}
