//! # Segmento de Estadísticas Compartidas
//! src/stats/counters.rs
//!
//! Contadores agregados de todos los procesos worker. Viven en memoria
//! compartida y solo se modifican con el mutex de estadísticas tomado.
//! Todos crecen monótonamente salvo `active_connections`.

use crate::http::StatusCode;
use crate::ipc::{ShmBox, SyncSet};
use serde::Serialize;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Layout del segmento compartido
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatsCounters {
    pub total_requests: u64,
    pub bytes_transferred: u64,
    pub status_200: u64,
    pub status_206: u64,
    pub status_400: u64,
    pub status_403: u64,
    pub status_404: u64,
    pub status_500: u64,
    pub active_connections: i64,
    /// Segundos UNIX de arranque del master
    pub start_time: i64,
    pub total_response_time_us: u64,
    pub cache_hits: u64,
}

/// Copia consistente de los contadores más valores derivados
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsSnapshot {
    #[serde(flatten)]
    pub counters: StatsCounters,
    pub uptime_secs: i64,
    pub avg_response_ms: f64,
}

/// Resultado de un intercambio request/response completo
#[derive(Debug, Clone, Copy)]
pub struct Exchange {
    pub status: StatusCode,
    pub bytes: u64,
    pub latency: Duration,
    pub cache_hit: bool,
}

/// Vista de un proceso sobre el segmento de estadísticas
pub struct SharedStats {
    segment: ShmBox<StatsCounters>,
    sync: Arc<SyncSet>,
}

impl SharedStats {
    /// Crea el segmento en cero, con `start_time` = ahora
    pub fn create(sync: Arc<SyncSet>) -> io::Result<Self> {
        let counters = StatsCounters {
            start_time: chrono::Utc::now().timestamp(),
            ..StatsCounters::default()
        };
        Ok(Self {
            segment: ShmBox::new(counters)?,
            sync,
        })
    }

    /// Ejecuta `f` sobre los contadores con el mutex de estadísticas tomado
    fn with_counters<R>(&self, f: impl FnOnce(&mut StatsCounters) -> R) -> io::Result<R> {
        let _guard = self.sync.stats.lock()?;
        // SAFETY: acceso exclusivo garantizado por el mutex entre procesos
        let counters = unsafe { &mut *self.segment.as_ptr() };
        Ok(f(counters))
    }

    /// Registra un intercambio completado
    pub fn record_exchange(&self, exchange: &Exchange) -> io::Result<()> {
        self.with_counters(|c| {
            c.total_requests += 1;
            c.bytes_transferred += exchange.bytes;
            c.total_response_time_us += exchange.latency.as_micros() as u64;
            if exchange.cache_hit {
                c.cache_hits += 1;
            }
            match exchange.status {
                StatusCode::Ok => c.status_200 += 1,
                StatusCode::PartialContent => c.status_206 += 1,
                StatusCode::BadRequest => c.status_400 += 1,
                StatusCode::Forbidden => c.status_403 += 1,
                StatusCode::NotFound => c.status_404 += 1,
                StatusCode::InternalServerError => c.status_500 += 1,
            }
        })
    }

    pub fn connection_opened(&self) -> io::Result<()> {
        self.with_counters(|c| c.active_connections += 1)
    }

    pub fn connection_closed(&self) -> io::Result<()> {
        self.with_counters(|c| {
            if c.active_connections > 0 {
                c.active_connections -= 1;
            }
        })
    }

    /// Copia los contadores bajo el mutex; el cálculo de derivados va fuera
    pub fn snapshot(&self) -> io::Result<StatsSnapshot> {
        let counters = self.with_counters(|c| *c)?;

        let uptime_secs = (chrono::Utc::now().timestamp() - counters.start_time).max(0);
        let avg_response_ms = if counters.total_requests > 0 {
            counters.total_response_time_us as f64 / counters.total_requests as f64 / 1000.0
        } else {
            0.0
        };

        Ok(StatsSnapshot {
            counters,
            uptime_secs,
            avg_response_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> SharedStats {
        SharedStats::create(Arc::new(SyncSet::create().unwrap())).unwrap()
    }

    fn exchange(status: StatusCode, bytes: u64, cache_hit: bool) -> Exchange {
        Exchange {
            status,
            bytes,
            latency: Duration::from_millis(2),
            cache_hit,
        }
    }

    #[test]
    fn test_starts_zeroed() {
        let snap = stats().snapshot().unwrap();
        assert_eq!(snap.counters.total_requests, 0);
        assert_eq!(snap.counters.active_connections, 0);
        assert!(snap.counters.start_time > 0);
        assert_eq!(snap.avg_response_ms, 0.0);
    }

    #[test]
    fn test_record_exchange_buckets() {
        let stats = stats();
        stats.record_exchange(&exchange(StatusCode::Ok, 100, true)).unwrap();
        stats.record_exchange(&exchange(StatusCode::PartialContent, 10, false)).unwrap();
        stats.record_exchange(&exchange(StatusCode::NotFound, 50, false)).unwrap();
        stats.record_exchange(&exchange(StatusCode::Forbidden, 50, false)).unwrap();
        stats.record_exchange(&exchange(StatusCode::InternalServerError, 0, false)).unwrap();

        let c = stats.snapshot().unwrap().counters;
        assert_eq!(c.total_requests, 5);
        assert_eq!(c.bytes_transferred, 210);
        assert_eq!(c.status_200, 1);
        assert_eq!(c.status_206, 1);
        assert_eq!(c.status_403, 1);
        assert_eq!(c.status_404, 1);
        assert_eq!(c.status_500, 1);
        assert_eq!(c.cache_hits, 1);
        assert_eq!(c.total_response_time_us, 10_000);
    }

    #[test]
    fn test_active_connections_no_negative() {
        let stats = stats();
        stats.connection_opened().unwrap();
        stats.connection_closed().unwrap();
        stats.connection_closed().unwrap();
        assert_eq!(stats.snapshot().unwrap().counters.active_connections, 0);
    }

    #[test]
    fn test_average_response_time() {
        let stats = stats();
        stats.record_exchange(&exchange(StatusCode::Ok, 0, false)).unwrap();
        stats.record_exchange(&exchange(StatusCode::Ok, 0, false)).unwrap();
        let snap = stats.snapshot().unwrap();
        assert!((snap.avg_response_ms - 2.0).abs() < f64::EPSILON);
    }
}
