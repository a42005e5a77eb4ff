//! # Proceso Worker
//! src/server/worker.rs
//!
//! Cada worker compite por el mutex de accept, acepta una conexión sobre el
//! socket heredado, suelta el mutex y entrega la conexión a su pool de
//! threads. El `accept()` queda serializado entre todos los workers; el
//! procesamiento de requests no.

use super::handler::HandlerContext;
use super::listener::{accept, is_accept_timeout};
use super::signals;
use super::SharedResources;
use crate::config::Config;
use crate::error::ServerError;
use crate::pool::ThreadPool;
use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn};

/// Espera máxima por el mutex de accept antes de revisar el flag
pub const ACCEPT_LOCK_WAIT: Duration = Duration::from_millis(500);

/// Loop principal de un worker
///
/// Retorna cuando `shutdown` se activa o cuando una señal interrumpe la
/// espera. Antes de retornar vacía y cierra el pool.
pub fn run(
    id: usize,
    config: &Config,
    listener: &TcpListener,
    shared: &SharedResources,
    shutdown: &AtomicBool,
) -> Result<(), ServerError> {
    let span = info_span!("worker", id, pid = std::process::id());
    let _enter = span.enter();

    let ctx = Arc::new(HandlerContext::new(
        config,
        Arc::clone(&shared.stats),
        Arc::clone(&shared.access_log),
    ));
    let handler_ctx = Arc::clone(&ctx);
    let handler_span = span.clone();
    // Los threads del pool bloquean SIGINT/SIGTERM: la señal llega al thread
    // que hace accept() y lo interrumpe
    let mut pool = signals::with_termination_blocked(|| {
        ThreadPool::new(
            config.threads_per_worker,
            &format!("worker{}", id),
            move |stream: TcpStream| {
                let _enter = handler_span.enter();
                handler_ctx.handle_connection(stream);
            },
        )
    })
    .map_err(ServerError::Signals)??;

    info!(threads = config.threads_per_worker, "worker listo");

    let result = accept_loop(listener, shared, &pool, shutdown);

    pool.shutdown();
    info!(cached_entries = ctx.cache().len(), "worker terminado");
    result
}

fn accept_loop(
    listener: &TcpListener,
    shared: &SharedResources,
    pool: &ThreadPool<TcpStream>,
    shutdown: &AtomicBool,
) -> Result<(), ServerError> {
    while !shutdown.load(Ordering::SeqCst) {
        let guard = match shared.sync.accept.lock_timeout(ACCEPT_LOCK_WAIT) {
            Ok(Some(guard)) => guard,
            Ok(None) => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => break,
            Err(e) => {
                error!(error = %e, "mutex de accept falló");
                return Err(ServerError::AcceptMutex(e));
            }
        };

        let accepted = accept(listener);
        drop(guard);

        match accepted {
            Ok((stream, peer)) => {
                debug!(%peer, "conexión aceptada");
                if pool.dispatch(stream).is_err() {
                    warn!(%peer, "pool apagado, conexión descartada");
                }
            }
            Err(e) if is_accept_timeout(&e) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                debug!("accept interrumpido por señal");
                break;
            }
            Err(e) => warn!(error = %e, "accept falló"),
        }
    }
    Ok(())
}
