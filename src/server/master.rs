//! # Proceso Master
//! src/server/master.rs
//!
//! 1. Valida la configuración
//! 2. Crea el socket de escucha, el segmento de estadísticas y los semáforos
//! 3. Hace `fork()` de `num_workers` workers
//! 4. Monitorea: reporta estadísticas cada `stats_interval_secs` y recoge
//!    workers que terminan solos (no los reemplaza)
//! 5. Al recibir SIGINT/SIGTERM: SIGTERM a cada worker, espera a todos y
//!    libera segmento, semáforos y socket en ese orden

use super::{listener, signals, worker, SharedResources};
use crate::config::Config;
use crate::error::ServerError;
use crate::stats::{dashboard, StatsSnapshot};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Timeout de `accept()` en el socket de escucha
pub const ACCEPT_POLL: Duration = Duration::from_millis(500);

/// Periodo del loop de monitoreo
const MONITOR_TICK: Duration = Duration::from_millis(200);

pub struct Master {
    config: Config,
    listener: TcpListener,
    resources: SharedResources,
    shutdown: Arc<AtomicBool>,
    workers: Vec<libc::pid_t>,
}

impl Master {
    /// Prepara todo lo que los workers heredan
    ///
    /// Cualquier error aquí es fatal para el servidor.
    pub fn new(config: Config) -> Result<Self, ServerError> {
        config.validate()?;

        if !config.document_root.is_dir() {
            warn!(
                root = %config.document_root.display(),
                "el document root no existe; todos los requests darán 404"
            );
        }

        let shutdown = signals::install().map_err(ServerError::Signals)?;

        let address = config.address();
        let listener = listener::bind(&address, config.backlog, ACCEPT_POLL)
            .map_err(|source| ServerError::Bind { address, source })?;

        let resources = SharedResources::create(&config)?;

        Ok(Self {
            config,
            listener,
            resources,
            shutdown,
            workers: Vec::new(),
        })
    }

    /// Dirección real del socket (útil con puerto 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Flag de terminación; activarlo equivale a recibir SIGTERM
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Arranca los workers y bloquea hasta el apagado
    ///
    /// Retorna el snapshot final de estadísticas.
    pub fn run(mut self) -> Result<StatsSnapshot, ServerError> {
        info!(address = %self.local_addr()?, "servidor escuchando");

        self.spawn_workers()?;
        self.monitor();
        self.stop_workers();

        let snapshot = self.resources.stats.snapshot()?;

        let Master {
            listener,
            resources,
            ..
        } = self;
        let SharedResources {
            sync,
            stats,
            access_log,
        } = resources;
        drop(stats);
        drop(access_log);
        drop(sync);
        drop(listener);

        dashboard::print_summary(&snapshot);
        info!("servidor detenido");
        Ok(snapshot)
    }

    fn spawn_workers(&mut self) -> Result<(), ServerError> {
        for id in 0..self.config.num_workers {
            // SAFETY: el master es single-threaded en este punto
            match unsafe { libc::fork() } {
                -1 => {
                    let e = io::Error::last_os_error();
                    error!(id, error = %e, "fork falló; se continúa con menos workers");
                }
                0 => {
                    let code = match worker::run(
                        id,
                        &self.config,
                        &self.listener,
                        &self.resources,
                        &self.shutdown,
                    ) {
                        Ok(()) => 0,
                        Err(e) => {
                            error!(id, error = %e, "worker terminó con error");
                            1
                        }
                    };
                    std::process::exit(code);
                }
                pid => {
                    info!(id, pid, "worker iniciado");
                    self.workers.push(pid);
                }
            }
        }

        if self.workers.is_empty() {
            return Err(ServerError::NoWorkers);
        }
        Ok(())
    }

    /// Espera la señal de terminación, reportando estadísticas periódicamente
    fn monitor(&mut self) {
        let interval = Duration::from_secs(self.config.stats_interval_secs);
        let mut last_report = Instant::now();

        while !self.shutdown.load(Ordering::SeqCst) {
            thread::sleep(MONITOR_TICK);
            self.reap_exited();

            if self.workers.is_empty() {
                warn!("todos los workers terminaron");
                break;
            }

            if !interval.is_zero() && last_report.elapsed() >= interval {
                match self.resources.stats.snapshot() {
                    Ok(snapshot) => info!("{}", dashboard::summary_line(&snapshot)),
                    Err(e) => warn!(error = %e, "stats: snapshot falló"),
                }
                last_report = Instant::now();
            }
        }
    }

    /// Recoge workers que terminaron sin que se les pidiera
    fn reap_exited(&mut self) {
        self.workers.retain(|&pid| {
            let mut status = 0;
            // SAFETY: pid es un hijo propio
            let rc = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
            if rc == pid {
                warn!(pid, status = %describe_status(status), "worker terminó inesperadamente");
                false
            } else {
                true
            }
        });
    }

    /// SIGTERM a todos los workers y espera a que terminen
    fn stop_workers(&mut self) {
        info!(workers = self.workers.len(), "apagando workers");

        for &pid in &self.workers {
            // SAFETY: señal a un hijo propio
            if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
                warn!(pid, error = %io::Error::last_os_error(), "kill falló");
            }
        }

        for pid in self.workers.drain(..) {
            match wait_for(pid) {
                Ok(status) => info!(pid, status = %describe_status(status), "worker finalizado"),
                Err(e) => warn!(pid, error = %e, "waitpid falló"),
            }
        }
    }
}

/// `waitpid` bloqueante que reintenta ante EINTR
fn wait_for(pid: libc::pid_t) -> io::Result<libc::c_int> {
    loop {
        let mut status = 0;
        // SAFETY: pid es un hijo propio
        if unsafe { libc::waitpid(pid, &mut status, 0) } == pid {
            return Ok(status);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

fn describe_status(status: libc::c_int) -> String {
    if libc::WIFEXITED(status) {
        format!("exit {}", libc::WEXITSTATUS(status))
    } else if libc::WIFSIGNALED(status) {
        format!("signal {}", libc::WTERMSIG(status))
    } else {
        format!("raw {}", status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut config = Config::default();
        config.num_workers = 0;
        assert!(matches!(Master::new(config), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_bind_failure_is_fatal() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dir = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.port = taken.local_addr().unwrap().port();
        config.access_log = dir.path().join("access.log");

        assert!(matches!(Master::new(config), Err(ServerError::Bind { .. })));
    }

    #[test]
    fn test_describe_status() {
        assert_eq!(describe_status(0), "exit 0");
        assert_eq!(describe_status(1 << 8), "exit 1");
        assert_eq!(describe_status(libc::SIGTERM), "signal 15");
    }
}
