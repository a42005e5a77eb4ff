//! # Logging
//! src/logging/mod.rs
//!
//! - Logs operativos con `tracing` (nivel desde `RUST_LOG`, por defecto `info`)
//! - Access log en archivo, compartido por todos los workers

pub mod access_log;

pub use access_log::{AccessLog, AccessRecord};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Instala el subscriber global
///
/// Se llama una vez en el master antes del `fork()`; los workers heredan el
/// subscriber ya instalado. Llamadas repetidas se ignoran.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_names(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
