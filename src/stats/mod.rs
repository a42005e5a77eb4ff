//! # Estadísticas del Servidor
//! src/stats/mod.rs
//!
//! - Contadores agregados en memoria compartida (todos los procesos)
//! - Snapshot consistente tomado bajo el mutex de estadísticas
//! - Render HTML / JSON para `/stats` y resumen para el master

pub mod counters;
pub mod dashboard;

pub use counters::{Exchange, SharedStats, StatsCounters, StatsSnapshot};
