use crate::error::PermissionError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Denied, Restricted and Unsupported come from providers other than
/// nokhwa's, which only knows granted or not yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(test), allow(dead_code))]
pub enum AuthState {
    Authorized,
    Denied,
    Restricted,
    NotDetermined,
    /// The platform has no notion of camera authorization
    Unsupported,
}

/// Completion callback for an access request. Runs on a platform thread.
pub type AccessCallback = Box<dyn Fn(bool) + Send + Sync + 'static>;

/// Platform hook for camera authorization
pub trait AuthorizationProvider {
    fn query(&self) -> AuthState;

    fn request(&self, on_complete: AccessCallback);
}

/// Authorization through nokhwa's platform initialization.
///
/// nokhwa only reports whether access is granted, so anything short of
/// granted is treated as not determined yet. V4L devices are always granted.
pub struct NokhwaAuthorization;

impl AuthorizationProvider for NokhwaAuthorization {
    fn query(&self) -> AuthState {
        if nokhwa::nokhwa_check() {
            AuthState::Authorized
        } else {
            AuthState::NotDetermined
        }
    }

    fn request(&self, on_complete: AccessCallback) {
        nokhwa::nokhwa_initialize(move |granted| on_complete(granted));
    }
}

/// Caches the authorization state and makes sure the OS prompt is raised at
/// most once per process.
///
/// The request callback never touches pipeline state: it raises
/// `pending_refresh`, which the tick thread consumes at the start of its
/// next tick.
pub struct PermissionGate {
    provider: Box<dyn AuthorizationProvider>,
    last_state: Option<AuthState>,
    requested: bool,
    pending_refresh: Arc<AtomicBool>,
}

impl PermissionGate {
    pub fn new(provider: Box<dyn AuthorizationProvider>) -> Self {
        Self {
            provider,
            last_state: None,
            requested: false,
            pending_refresh: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Query the platform and cache the answer. `Unsupported` reads as
    /// `Authorized`.
    pub fn is_authorized(&mut self) -> AuthState {
        let state = match self.provider.query() {
            AuthState::Unsupported => AuthState::Authorized,
            other => other,
        };
        if self.last_state != Some(state) {
            tracing::info!("Camera authorization: {:?}", state);
        }
        self.last_state = Some(state);
        state
    }

    /// The state seen by the most recent query, if any
    #[cfg(test)]
    pub fn cached(&self) -> Option<AuthState> {
        self.last_state
    }

    /// Raise the OS prompt. Only the first call per gate does anything.
    pub fn request_access(&mut self) {
        if self.requested {
            return;
        }
        self.requested = true;
        tracing::info!("Requesting camera access");

        let pending = Arc::clone(&self.pending_refresh);
        self.provider.request(Box::new(move |granted| {
            if granted {
                tracing::info!("camera permission granted");
            } else {
                tracing::info!("camera permission denied");
            }
            pending.store(true, Ordering::Release);
        }));
    }

    /// Refuse on Denied/Restricted, prompt once on NotDetermined and let the
    /// open attempt decide.
    pub fn ensure_access(&mut self) -> Result<(), PermissionError> {
        match self.is_authorized() {
            AuthState::Authorized | AuthState::Unsupported => Ok(()),
            AuthState::Denied => Err(PermissionError::Denied),
            AuthState::Restricted => Err(PermissionError::Restricted),
            AuthState::NotDetermined => {
                self.request_access();
                Ok(())
            }
        }
    }

    /// Consume the refresh flag raised by the request callback
    pub fn take_pending_refresh(&self) -> bool {
        self.pending_refresh.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeAuthorization;

    #[test]
    fn v4l_access_is_granted_without_prompt() {
        let mut gate = PermissionGate::new(Box::new(NokhwaAuthorization));
        assert_eq!(gate.is_authorized(), AuthState::Authorized);
        assert!(gate.ensure_access().is_ok());
    }

    #[test]
    fn unsupported_reads_as_authorized() {
        let mut gate = PermissionGate::new(Box::new(FakeAuthorization::new(AuthState::Unsupported)));
        assert_eq!(gate.is_authorized(), AuthState::Authorized);
        assert_eq!(gate.cached(), Some(AuthState::Authorized));
        assert!(gate.ensure_access().is_ok());
    }

    #[test]
    fn denied_and_restricted_are_refused() {
        let mut gate = PermissionGate::new(Box::new(FakeAuthorization::new(AuthState::Denied)));
        assert_eq!(gate.ensure_access(), Err(PermissionError::Denied));

        let mut gate = PermissionGate::new(Box::new(FakeAuthorization::new(AuthState::Restricted)));
        assert_eq!(gate.ensure_access(), Err(PermissionError::Restricted));
    }

    #[test]
    fn prompt_fires_once_per_gate() {
        let provider = FakeAuthorization::new(AuthState::NotDetermined);
        let mut gate = PermissionGate::new(Box::new(provider.clone()));

        assert!(gate.ensure_access().is_ok());
        assert!(gate.ensure_access().is_ok());
        gate.request_access();

        assert_eq!(provider.request_count(), 1);
    }

    #[test]
    fn callback_raises_single_slot_refresh() {
        let provider = FakeAuthorization::new(AuthState::NotDetermined);
        let mut gate = PermissionGate::new(Box::new(provider.clone()));
        gate.request_access();

        assert!(!gate.take_pending_refresh());

        provider.grant_from_other_thread();

        assert!(gate.take_pending_refresh());
        assert!(!gate.take_pending_refresh());
        assert_eq!(gate.is_authorized(), AuthState::Authorized);
    }
}
