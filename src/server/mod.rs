//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! ```text
//!                 Master
//!   bind · shm · semáforos · fork × N
//!        │
//!        ├── Worker 0 ──accept (mutex)──▶ ThreadPool ──▶ handler
//!        ├── Worker 1 ──accept (mutex)──▶ ThreadPool ──▶ handler
//!        └── ...
//! ```
//!
//! - `listener`: socket de escucha compartido
//! - `signals`: flag de terminación (SIGINT/SIGTERM)
//! - `handler`: loop keep-alive de una conexión
//! - `worker`: loop de accept de un proceso worker
//! - `master`: creación, monitoreo y apagado de los workers

pub mod handler;
pub mod listener;
pub mod master;
pub mod signals;
pub mod worker;

pub use handler::HandlerContext;
pub use master::Master;

use crate::config::Config;
use crate::error::ServerError;
use crate::ipc::SyncSet;
use crate::logging::AccessLog;
use crate::stats::SharedStats;
use std::sync::Arc;

/// Recursos que el master crea antes del `fork()` y todos los workers heredan
#[derive(Clone)]
pub struct SharedResources {
    pub sync: Arc<SyncSet>,
    pub stats: Arc<SharedStats>,
    pub access_log: Arc<AccessLog>,
}

impl SharedResources {
    pub fn create(config: &Config) -> Result<Self, ServerError> {
        let sync = Arc::new(SyncSet::create().map_err(|source| ServerError::Ipc {
            what: "semaphores",
            source,
        })?);

        let stats = Arc::new(SharedStats::create(Arc::clone(&sync)).map_err(|source| {
            ServerError::Ipc {
                what: "statistics segment",
                source,
            }
        })?);

        let access_log = AccessLog::open(
            &config.access_log,
            config.access_log_max_bytes,
            Arc::clone(&sync),
        )
        .map_err(|source| ServerError::AccessLog {
            path: config.access_log.clone(),
            source,
        })?;

        Ok(Self {
            sync,
            stats,
            access_log: Arc::new(access_log),
        })
    }
}
