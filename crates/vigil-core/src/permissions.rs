/// Result of probing one local capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityState {
    Granted,
    Denied,
    /// Blocked by enterprise policy or parental controls; the user cannot
    /// grant it from system settings.
    Restricted,
}

/// Probes OS-level access before a session starts.
///
/// Platform backends live in the embedding application; the engine only
/// consumes the verdict and refuses to start a mode whose capability is
/// missing.
pub trait CapabilityProbe: Send + Sync {
    fn camera_access(&self) -> CapabilityState;
    fn screen_access(&self) -> CapabilityState;
}

/// Probe that reports everything as granted, for embedders that handle
/// permission prompting themselves and for tests.
pub struct AssumeGranted;

impl CapabilityProbe for AssumeGranted {
    fn camera_access(&self) -> CapabilityState {
        CapabilityState::Granted
    }

    fn screen_access(&self) -> CapabilityState {
        CapabilityState::Granted
    }
}
