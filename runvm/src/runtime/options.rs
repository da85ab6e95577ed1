use serde::{Deserialize, Serialize};

/// Backend selection passed through from global CLI flags to the supervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOptions {
    /// Container backend (`process`, or a hypervisor driver name).
    pub driver: String,
    /// Guest kernel image for hypervisor backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel: Option<String>,
    /// Guest initrd for hypervisor backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initrd: Option<String>,
    /// Alternate hypervisor image (VirtualBox backend).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vbox: Option<String>,
}
