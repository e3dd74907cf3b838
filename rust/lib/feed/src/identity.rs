use std::sync::{PoisonError, RwLock};

use tracing::info;

use crate::model::Viewer;
use crate::remote::IdentityProvider;

/// Holds the signed-in viewer for the session.
///
/// Signing in is somebody else's job; this only remembers the outcome.
#[derive(Default)]
pub struct SessionIdentity {
    viewer: RwLock<Option<Viewer>>,
}

impl SessionIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(viewer: Viewer) -> Self {
        Self {
            viewer: RwLock::new(Some(viewer)),
        }
    }

    pub fn sign_in(&self, viewer: Viewer) {
        info!(viewer = %viewer.id, "signed in");
        *self.viewer.write().unwrap_or_else(PoisonError::into_inner) = Some(viewer);
    }

    pub fn sign_out(&self) {
        *self.viewer.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_viewer(&self) -> Option<Viewer> {
        self.viewer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_and_out() {
        let identity = SessionIdentity::anonymous();
        assert!(identity.current_viewer().is_none());

        identity.sign_in(Viewer::new("u1"));
        assert_eq!(identity.current_viewer().unwrap().id, "u1");

        identity.sign_out();
        assert!(identity.current_viewer().is_none());
    }
}
