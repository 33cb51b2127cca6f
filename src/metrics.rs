use metrics::describe_counter;
use metrics::describe_histogram;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use shuttle_axum::axum::{routing::get, Router};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the series the data layer emits.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        describe();
        Ok(Self { handle })
    }

    /// Recorder that is not installed globally; for tests.
    pub fn detached() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            handle: recorder.handle(),
        }
    }

    /// `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("series_cache_hits_total", "Series reads served from a fresh cache entry");
    describe_counter!("series_cache_misses_total", "Series reads that found no fresh cache entry");
    describe_counter!("series_refresh_insufficient_total", "Refreshes that produced fewer than two points");
    describe_counter!("provider_requests_total", "Upstream HTTP requests issued");
    describe_counter!("provider_errors_total", "Upstream HTTP requests that failed");
    describe_counter!("translation_cache_hits_total", "Translations served from translation memory");
    describe_counter!("translation_backend_calls_total", "Translations sent to the vendor");
    describe_histogram!("series_refresh_ms", "Wall time of a series refresh in milliseconds");
}
