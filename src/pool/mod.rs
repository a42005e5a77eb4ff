//! # Pool de Threads
//! src/pool/mod.rs
//!
//! Conjunto fijo de threads que consumen una cola FIFO interna. El loop del
//! worker process hace `dispatch` de cada conexión aceptada y uno de los
//! threads en espera la procesa.
//!
//! ## Apagado
//!
//! `shutdown()` marca el flag y despierta a todos los threads. Cada thread
//! sigue vaciando la cola y termina cuando la ve vacía con el flag activo;
//! las tareas ya desencoladas terminan normalmente. Después de `shutdown`,
//! `dispatch` rechaza tareas nuevas.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("thread pool size must be >= 1")]
    ZeroThreads,

    #[error("cannot spawn pool thread: {0}")]
    Spawn(#[from] io::Error),
}

struct PoolState<T> {
    queue: VecDeque<T>,
    shutdown: bool,
}

struct PoolShared<T> {
    state: Mutex<PoolState<T>>,
    /// Notifica tareas nuevas o apagado
    available: Condvar,
}

/// Pool de `size` threads que ejecutan `handler` sobre cada tarea
pub struct ThreadPool<T: Send + 'static> {
    shared: Arc<PoolShared<T>>,
    threads: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> ThreadPool<T> {
    /// Crea el pool y arranca todos sus threads
    ///
    /// # Ejemplo
    /// ```
    /// use concurrent_http::pool::ThreadPool;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let done = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&done);
    /// let mut pool = ThreadPool::new(2, "demo", move |n: usize| {
    ///     counter.fetch_add(n, Ordering::SeqCst);
    /// }).unwrap();
    ///
    /// pool.dispatch(1).unwrap();
    /// pool.dispatch(2).unwrap();
    /// pool.shutdown();
    /// assert_eq!(done.load(Ordering::SeqCst), 3);
    /// ```
    pub fn new<F>(size: usize, name: &str, handler: F) -> Result<Self, PoolError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        if size == 0 {
            return Err(PoolError::ZeroThreads);
        }

        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        });
        let handler = Arc::new(handler);

        let mut threads = Vec::with_capacity(size);
        for i in 0..size {
            let thread_shared = Arc::clone(&shared);
            let thread_handler = Arc::clone(&handler);
            let thread_name = format!("{}-{}", name, i);

            let spawned = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || Self::worker_loop(&thread_name, &thread_shared, &*thread_handler));

            match spawned {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    // Los threads ya creados se apagan al soltar el pool
                    drop(Self { shared, threads });
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        Ok(Self { shared, threads })
    }

    /// Loop principal de cada thread
    fn worker_loop<F: Fn(T)>(name: &str, shared: &PoolShared<T>, handler: &F) {
        debug!(thread = name, "pool: thread iniciado");

        loop {
            let task = {
                let mut state = shared.state.lock();
                while state.queue.is_empty() && !state.shutdown {
                    shared.available.wait(&mut state);
                }
                match state.queue.pop_front() {
                    Some(task) => task,
                    // shutdown con la cola vacía
                    None => break,
                }
            };

            if panic::catch_unwind(AssertUnwindSafe(|| handler(task))).is_err() {
                error!(thread = name, "pool: la tarea entró en pánico");
            }
        }

        debug!(thread = name, "pool: thread terminado");
    }

    /// Encola una tarea al final de la FIFO y despierta un thread
    ///
    /// Si el pool ya está apagado la tarea se devuelve en `Err`.
    pub fn dispatch(&self, task: T) -> Result<(), T> {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(task);
        }
        state.queue.push_back(task);
        drop(state);

        self.shared.available.notify_one();
        Ok(())
    }

    /// Apaga el pool y espera a que todos los threads terminen
    ///
    /// Es idempotente.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
        }
        self.shared.available.notify_all();

        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("pool: un thread terminó con pánico");
            }
        }
    }

    /// Threads vivos
    pub fn size(&self) -> usize {
        self.threads.len()
    }
}

impl<T: Send + 'static> Drop for ThreadPool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
