//! # Structured Logging Module
//!
//! Environment-aware structured logging for the replay engine. Every twin and
//! event lifecycle transition goes through the helpers below so that records
//! carry the same fields whether they are rendered as text or JSON.

use chrono::{DateTime, Utc};
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = use_json_format();

        let text_layer = (!json).then(|| {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
        });
        let json_layer = json.then(|| {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
        });

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(text_layer)
            .with(json_layer);

        // A global subscriber may already be installed (tests, embedding hosts)
        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("VESSEL_REPLAY_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn use_json_format() -> bool {
    std::env::var("VESSEL_REPLAY_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log structured data for twin lifecycle operations
pub fn log_twin_operation(
    operation: &str,
    entity_key: &str,
    entity_id: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        entity_key = %entity_key,
        entity_id = entity_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🚢 TWIN_OPERATION"
    );
}

/// Log structured data for scheduled event transitions
pub fn log_event_operation(
    operation: &str,
    entity_key: &str,
    event_kind: &str,
    fire_at: DateTime<Utc>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        entity_key = %entity_key,
        event_kind = %event_kind,
        fire_at = %fire_at.to_rfc3339(),
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "⏰ EVENT_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
