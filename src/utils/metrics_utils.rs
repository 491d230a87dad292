use crate::{config::StatsdConfig, error::ProcessorError};
use metrics_exporter_statsd::StatsdBuilder;

/// Points the `metrics` macros at the configured statsd endpoint. Metric
/// names are shipped under the `osu.pp` prefix, tagged per mode by the call
/// sites. Without an endpoint the macros stay no-ops.
pub fn install(config: &StatsdConfig) -> Result<(), ProcessorError> {
    let recorder = StatsdBuilder::from(config.host.as_str(), config.port)
        .build(Some("osu.pp"))
        .map_err(|e| ProcessorError::Metrics(e.to_string()))?;

    metrics::set_boxed_recorder(Box::new(recorder)).map_err(|e| ProcessorError::Metrics(e.to_string()))?;

    Ok(())
}
