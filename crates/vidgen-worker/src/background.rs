//! Background video resolution.
//!
//! Site-relative paths are made absolute; assets on the managed storage host
//! are probed and dropped when they cannot be fetched, so the composition
//! falls back to its plain background instead of failing the render.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use crate::backends::ReachabilityProbe;
use crate::metrics::record_background_degraded;

pub struct BackgroundResolver {
    site_base_url: String,
    storage_host: String,
    probe: Arc<dyn ReachabilityProbe>,
    timeout: Duration,
}

impl BackgroundResolver {
    pub fn new(
        site_base_url: impl Into<String>,
        storage_host: impl Into<String>,
        probe: Arc<dyn ReachabilityProbe>,
        timeout: Duration,
    ) -> Self {
        Self {
            site_base_url: site_base_url.into(),
            storage_host: storage_host.into(),
            probe,
            timeout,
        }
    }

    /// A URL the renderer can load, or `None` for the fallback visual.
    pub async fn resolve(&self, reference: Option<&str>) -> Option<String> {
        let reference = reference.map(str::trim).filter(|r| !r.is_empty())?;

        let url = match Url::parse(reference) {
            Ok(url) => url,
            Err(_) => return self.absolute(reference),
        };

        if url.host_str() != Some(self.storage_host.as_str()) {
            return Some(reference.to_string());
        }

        match tokio::time::timeout(self.timeout, self.probe.is_reachable(reference)).await {
            Ok(true) => Some(reference.to_string()),
            Ok(false) => {
                warn!(url = reference, "Background video unreachable, using fallback");
                record_background_degraded("unreachable");
                None
            }
            Err(_) => {
                warn!(
                    url = reference,
                    timeout_secs = self.timeout.as_secs(),
                    "Background video probe timed out, using fallback"
                );
                record_background_degraded("timeout");
                None
            }
        }
    }

    fn absolute(&self, path: &str) -> Option<String> {
        let base = self.site_base_url.trim_end_matches('/');
        let resolved = format!("{}/{}", base, path.trim_start_matches('/'));
        debug!(path, resolved = %resolved, "Resolved site-relative background");
        Some(resolved)
    }
}
