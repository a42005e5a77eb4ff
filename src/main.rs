//! # Concurrent HTTP Server - Entry Point
//! src/main.rs
//!
//! Carga la configuración, muestra el resumen y arranca el master. Cualquier
//! error de arranque termina el proceso con código 1.

use anyhow::Context;
use concurrent_http::config::{Config, ConfigError};
use concurrent_http::logging;
use concurrent_http::server::Master;

fn main() -> anyhow::Result<()> {
    let config = match Config::load() {
        Ok(config) => config,
        // --help, --version y errores de uso los maneja clap
        Err(ConfigError::Cli(e)) => e.exit(),
        Err(e) => return Err(e).context("loading configuration"),
    };

    logging::init();

    println!("=================================");
    println!("  Concurrent HTTP/1.1 Server");
    println!("  Procesos · Threads · Cache LRU");
    println!("=================================\n");
    config.print_summary();

    let master = Master::new(config).context("starting server")?;
    master.run().context("running server")?;

    Ok(())
}
