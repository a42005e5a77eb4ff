//! # Errores del Servidor
//! src/error.rs
//!
//! Errores fatales de arranque y de ciclo de vida. Los errores de una
//! conexión individual nunca llegan aquí: se convierten en respuestas 4xx/5xx
//! o en el cierre de esa conexión.

use crate::config::ConfigError;
use crate::pool::PoolError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot bind {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error("cannot create shared {what}: {source}")]
    Ipc { what: &'static str, source: io::Error },

    #[error("cannot install signal handlers: {0}")]
    Signals(io::Error),

    #[error("cannot open access log {path}: {source}")]
    AccessLog {
        path: std::path::PathBuf,
        source: io::Error,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("no worker process could be started")]
    NoWorkers,

    #[error("accept mutex failed: {0}")]
    AcceptMutex(io::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}
