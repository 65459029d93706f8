use tpcopy_config::{ConfigHandle, QuirkConfig};
use tpcopy_protocol::QuirkProfile;

use crate::backend::{ControlPlane, EndpointRegistry, Endpoints};

/// Identifies backends that break transport session reuse.
pub struct QuirkDetector<'a> {
    registry: &'a dyn EndpointRegistry,
    control: &'a dyn ControlPlane,
    quirks: QuirkConfig,
}

impl<'a> QuirkDetector<'a> {
    pub fn new(endpoints: Endpoints<'a>, quirks: QuirkConfig) -> Self {
        Self {
            registry: endpoints.registry,
            control: endpoints.control,
            quirks,
        }
    }

    /// Probes `identifier`. Never fails: an unreachable or anonymous
    /// backend yields [`QuirkProfile::unknown`].
    pub async fn probe(&self, identifier: &str) -> QuirkProfile {
        if !self.registry.requires_negotiation(identifier) {
            return QuirkProfile::none();
        }
        match self.control.probe(identifier).await {
            Ok(info) => match info.backend_type() {
                Some(backend) => {
                    let isolate = self.quirks.requires_isolation(backend);
                    tracing::debug!(identifier, backend, isolate, "backend identified");
                    QuirkProfile::identified(backend, isolate)
                }
                None => {
                    tracing::debug!(identifier, "probe reported no backend type");
                    QuirkProfile::unknown()
                }
            },
            Err(e) => {
                tracing::warn!(identifier, error = %e, "backend probe failed");
                QuirkProfile::unknown()
            }
        }
    }
}

/// Disables transport session reuse if any profile asks for isolation.
///
/// The change is process-wide. Returns whether isolation was requested.
pub fn apply_session_isolation(config: &ConfigHandle, profiles: &[&QuirkProfile]) -> bool {
    let Some(profile) = profiles.iter().find(|p| p.needs_session_isolation) else {
        tracing::debug!("no backend quirks detected");
        return false;
    };
    let changed = config.disable_session_reuse();
    tracing::info!(
        backend = profile.backend_type.as_deref().unwrap_or("unknown"),
        changed,
        "disabling transport session reuse"
    );
    true
}
