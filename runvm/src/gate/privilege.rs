use nix::unistd::geteuid;
use runvm_shared::{RunvmError, RunvmResult};

/// Verifies the caller may manage VMs and devices.
///
/// A trait so the orchestrator can be driven without root in tests.
pub trait PrivilegeGate: Send + Sync {
    fn check(&self) -> RunvmResult<()>;
}

/// Requires the effective user to be root.
#[derive(Debug, Clone, Copy, Default)]
pub struct EffectiveUidGate;

impl PrivilegeGate for EffectiveUidGate {
    fn check(&self) -> RunvmResult<()> {
        let euid = geteuid();
        if euid.is_root() {
            Ok(())
        } else {
            Err(RunvmError::InsufficientPrivilege(format!(
                "runvm should be run as root (effective uid {})",
                euid
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_matches_effective_uid() {
        let result = EffectiveUidGate.check();
        if geteuid().is_root() {
            assert!(result.is_ok());
        } else {
            assert!(matches!(result, Err(RunvmError::InsufficientPrivilege(_))));
        }
    }
}
