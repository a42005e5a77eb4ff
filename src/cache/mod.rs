//! # Cache LRU de Contenido
//! src/cache/mod.rs
//!
//! Cache en memoria, acotada en bytes, con desalojo LRU. Hay una por proceso
//! worker y la comparten todos los threads de su pool; los bytes cacheados
//! nunca se comparten entre procesos.
//!
//! `get` promueve la entrada a la cabeza de la lista, así que lectura y
//! escritura toman el mismo lock exclusivo.
//!
//! ## Ejemplo
//!
//! ```
//! use concurrent_http::cache::Cache;
//!
//! let cache = Cache::new(1024);
//! cache.put("/www/index.html", b"<h1>hola</h1>".to_vec());
//! assert_eq!(cache.get("/www/index.html").as_deref(), Some(&b"<h1>hola</h1>"[..]));
//! ```

pub mod lru;

pub use lru::{CacheEntry, PutOutcome};

use bytes::Bytes;
use lru::LruList;
use parking_lot::Mutex;

/// Cache thread-safe de blobs indexados por path resuelto
pub struct Cache {
    inner: Mutex<LruList>,
}

impl Cache {
    /// Crea una cache con `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruList::new(capacity)),
        }
    }

    /// Crea una cache de `mb` megabytes
    pub fn with_megabytes(mb: usize) -> Self {
        Self::new(mb.saturating_mul(1024 * 1024))
    }

    /// Retorna los bytes de `key` y la promueve a más-recientemente-usada
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.inner.lock().get(key)
    }

    /// Inserta o reemplaza `key`
    ///
    /// Una entrada mayor que la capacidad total no se cachea.
    pub fn put(&self, key: &str, data: impl Into<Bytes>) -> PutOutcome {
        let outcome = self.inner.lock().put(key, data.into());
        if let PutOutcome::Inserted { evicted } | PutOutcome::Replaced { evicted } = outcome {
            if evicted > 0 {
                tracing::debug!(key, evicted, "cache: entradas LRU desalojadas");
            }
        }
        outcome
    }

    pub fn remove(&self, key: &str) -> Option<Bytes> {
        self.inner.lock().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().contains(key)
    }

    /// Número de entradas
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Bytes ocupados
    pub fn size(&self) -> usize {
        self.inner.lock().current_size()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    /// Claves en orden MRU -> LRU
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().keys()
    }
}
