use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Port the Prometheus listener binds when none is configured.
pub const DEFAULT_METRICS_PORT: u16 = 9000;

/// Installs the global metrics recorder and starts an HTTP listener serving it for
/// Prometheus scraping on `[::]:port`.
///
/// Every metric carries an `app` label with `app_name`. Outside a tokio runtime the listener
/// gets a dedicated thread.
pub fn init_metrics(app_name: &str, port: Option<u16>) -> Result<(), BuildError> {
    let address = SocketAddr::new(
        IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        port.unwrap_or(DEFAULT_METRICS_PORT),
    );

    PrometheusBuilder::new()
        .with_http_listener(address)
        .add_global_label("app", app_name)
        .install()?;

    Ok(())
}
