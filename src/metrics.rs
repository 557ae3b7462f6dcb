// ABOUTME: Prometheus export for the counters recorded by athenais-core
// ABOUTME: Installs the global recorder with an HTTP scrape listener when configured

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

fn exporter(listen: SocketAddr) -> PrometheusBuilder {
    PrometheusBuilder::new().with_http_listener(listen)
}

/// Install the Prometheus recorder and serve `/metrics` on `listen`.
///
/// Must be called from inside the Tokio runtime, at most once per process.
pub fn init_metrics(listen: SocketAddr) -> Result<()> {
    exporter(listen)
        .install()
        .context("Failed to install Prometheus exporter")?;
    tracing::info!(%listen, "Prometheus metrics exporter listening");
    Ok(())
}

#[cfg(test)]
mod tests {
    use athenais_core::metrics as counters;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_core_counters_render_as_prometheus_text() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            counters::record_event_received("m.room.message");
            counters::record_event_received("m.room.message");
            counters::record_room_joined();
        });

        let rendered = handle.render();
        assert!(rendered.contains(counters::EVENTS_RECEIVED));
        assert!(rendered.contains(r#"event_type="m.room.message"} 2"#));
        assert!(rendered.contains(&format!("{} 1", counters::ROOMS_JOINED)));
    }
}
