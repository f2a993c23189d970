use std::{sync::Arc, time::Instant};

use bpi_sessions::BpiService;

#[cfg(feature = "metrics")]
use bpi_metrics::MetricsHandle;

/// Shared state behind every route.
pub struct GatewayState {
    /// The DetectIntent pipeline and its backend client.
    pub service: Arc<BpiService>,
    /// Server version string.
    pub version: String,
    pub started_at: Instant,
    /// Prometheus handle, `None` when metrics are disabled.
    #[cfg(feature = "metrics")]
    pub metrics_handle: Option<MetricsHandle>,
}

impl GatewayState {
    pub fn new(service: Arc<BpiService>) -> Arc<Self> {
        Arc::new(Self {
            service,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
            #[cfg(feature = "metrics")]
            metrics_handle: None,
        })
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(service: Arc<BpiService>, metrics_handle: Option<MetricsHandle>) -> Arc<Self> {
        Arc::new(Self {
            service,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
            metrics_handle,
        })
    }
}
