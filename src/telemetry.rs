use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;
use crate::session::SessionId;

/// Initialize structured logging.
///
/// `RUST_LOG` wins over the configured level when set. JSON output carries the
/// current span so session and correlation ids appear on every line.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    tracing::debug!("Workflow forge telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span with common session attributes
pub fn create_session_span(
    operation: &str,
    session_id: Option<SessionId>,
    correlation_id: Option<&str>,
) -> tracing::Span {
    tracing::info_span!(
        "pipeline_session",
        operation = operation,
        session.id = session_id.map(tracing::field::display),
        correlation.id = correlation_id,
        otel.kind = "internal"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_are_unique() {
        assert_ne!(generate_correlation_id(), generate_correlation_id());
    }

    #[test]
    fn test_session_span_builds_without_subscriber() {
        let span = create_session_span("replay", Some(SessionId::new()), Some("abc"));
        let _entered = span.enter();
    }
}
