//! # Concurrent HTTP Server
//! src/lib.rs
//!
//! Servidor HTTP/1.1 de archivos estáticos construido sobre primitivas del
//! sistema operativo: procesos, memoria compartida, semáforos entre procesos,
//! pools de threads y una cache LRU por proceso.
//!
//! ## Arquitectura
//!
//! - `config`: CLI, variables de entorno y archivo TOML
//! - `error`: errores fatales del servidor
//! - `logging`: `tracing` y access log con rotación
//! - `http`: parsing de requests, rangos de bytes y respuestas
//! - `cache`: cache LRU acotada en bytes
//! - `ipc`: memoria compartida y mutex entre procesos
//! - `stats`: contadores compartidos y dashboard `/stats`
//! - `pool`: pool de threads con cola FIFO
//! - `router`: virtual hosts y resolución de paths
//! - `cgi`: ejecución de scripts dinámicos
//! - `server`: master, workers y manejo de conexiones
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use concurrent_http::config::Config;
//! use concurrent_http::server::Master;
//!
//! let config = Config::default();
//! let master = Master::new(config).expect("Error al iniciar servidor");
//! master.run().expect("Error durante la ejecución");
//! ```

pub mod cache;
pub mod cgi;
pub mod config;
pub mod error;
pub mod http;
pub mod ipc;
pub mod logging;
pub mod pool;
pub mod router;
pub mod server;
pub mod stats;

pub use error::ServerError;
