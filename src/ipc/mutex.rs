//! # Mutex entre Procesos
//! src/ipc/mutex.rs
//!
//! Semáforo POSIX sin nombre (`sem_init` con `pshared = 1`) inicializado en 1
//! y alojado en memoria compartida. Lo heredan todos los procesos creados
//! con `fork()` después de su creación.

use super::shm::ShmBox;
use std::io;
use std::time::Duration;

pub struct ProcessMutex {
    sem: ShmBox<libc::sem_t>,
}

/// Libera el mutex (`sem_post`) al salir de scope
pub struct ProcessMutexGuard<'a> {
    mutex: &'a ProcessMutex,
}

impl ProcessMutex {
    pub fn new() -> io::Result<Self> {
        // SAFETY: sem_t es POD; sem_init lo deja en un estado válido
        let sem = ShmBox::new(unsafe { std::mem::zeroed::<libc::sem_t>() })?;
        let rc = unsafe { libc::sem_init(sem.as_ptr(), 1, 1) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { sem })
    }

    /// Bloquea hasta adquirir el mutex
    ///
    /// Un `EINTR` reintenta la espera: las secciones críticas que usan este
    /// camino (estadísticas, log) son cortas y no deben perderse.
    pub fn lock(&self) -> io::Result<ProcessMutexGuard<'_>> {
        loop {
            // SAFETY: el semáforo fue inicializado en `new`
            if unsafe { libc::sem_wait(self.sem.as_ptr()) } == 0 {
                return Ok(ProcessMutexGuard { mutex: self });
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    /// Intenta adquirir el mutex esperando como máximo `timeout`
    ///
    /// - `Ok(Some(guard))`: adquirido
    /// - `Ok(None)`: venció el plazo
    /// - `Err(e)` con `ErrorKind::Interrupted`: una señal cortó la espera;
    ///   quien llama lo trata como orden de parar
    pub fn lock_timeout(&self, timeout: Duration) -> io::Result<Option<ProcessMutexGuard<'_>>> {
        let deadline = realtime_deadline(timeout)?;
        // SAFETY: semáforo inicializado; deadline es un timespec válido
        if unsafe { libc::sem_timedwait(self.sem.as_ptr(), &deadline) } == 0 {
            return Ok(Some(ProcessMutexGuard { mutex: self }));
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ETIMEDOUT) => Ok(None),
            _ => Err(err),
        }
    }

    fn unlock(&self) {
        // SAFETY: solo se llama desde el guard que tomó el semáforo
        unsafe { libc::sem_post(self.sem.as_ptr()) };
    }
}

impl Drop for ProcessMutex {
    fn drop(&mut self) {
        if self.sem.is_owner() {
            // SAFETY: los workers ya terminaron cuando el master libera recursos
            unsafe { libc::sem_destroy(self.sem.as_ptr()) };
        }
    }
}

impl Drop for ProcessMutexGuard<'_> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

/// `sem_timedwait` espera un instante absoluto de CLOCK_REALTIME
fn realtime_deadline(timeout: Duration) -> io::Result<libc::timespec> {
    let mut now = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let mut sec = now.tv_sec + timeout.as_secs() as libc::time_t;
    let mut nsec = now.tv_nsec + timeout.subsec_nanos() as libc::c_long;
    if nsec >= 1_000_000_000 {
        sec += 1;
        nsec -= 1_000_000_000;
    }
    Ok(libc::timespec {
        tv_sec: sec,
        tv_nsec: nsec,
    })
}
