//! # Sincronización entre Procesos
//! src/ipc/mod.rs
//!
//! Primitivas que el master crea antes de hacer `fork()` y que todos los
//! workers heredan:
//!
//! - `ShmBox<T>`: un valor en memoria compartida anónima
//! - `ProcessMutex`: semáforo binario compartido
//! - `SyncSet`: los tres mutex del servidor (accept, estadísticas, log)

pub mod mutex;
pub mod shm;

pub use mutex::{ProcessMutex, ProcessMutexGuard};
pub use shm::ShmBox;

use std::io;

/// Conjunto de mutex con nombre compartidos por master y workers
pub struct SyncSet {
    /// Serializa `accept()` sobre el socket compartido
    pub accept: ProcessMutex,
    /// Protege el segmento de estadísticas
    pub stats: ProcessMutex,
    /// Protege el archivo de access log
    pub log: ProcessMutex,
}

impl SyncSet {
    pub fn create() -> io::Result<Self> {
        Ok(Self {
            accept: ProcessMutex::new()?,
            stats: ProcessMutex::new()?,
            log: ProcessMutex::new()?,
        })
    }
}
