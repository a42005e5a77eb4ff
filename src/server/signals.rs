//! # Señales de Terminación
//! src/server/signals.rs
//!
//! SIGINT y SIGTERM solo activan un flag. Se registran en el master antes de
//! `fork()`, así que cada worker hereda el handler y tiene su propia copia
//! del flag.

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Registra SIGINT/SIGTERM y devuelve el flag que activan
pub fn install() -> io::Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        flag::register(signal, Arc::clone(&shutdown))?;
    }
    Ok(shutdown)
}

/// Ejecuta `f` con SIGINT/SIGTERM bloqueadas en el thread actual
///
/// Los threads creados dentro de `f` heredan la máscara y nunca reciben
/// esas señales. Al salir se restaura la máscara anterior.
pub fn with_termination_blocked<R>(f: impl FnOnce() -> R) -> io::Result<R> {
    // SAFETY: sigset_t se inicializa con sigemptyset antes de usarse
    let mut set: libc::sigset_t = unsafe { std::mem::zeroed() };
    let mut previous: libc::sigset_t = unsafe { std::mem::zeroed() };
    unsafe {
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, SIGINT);
        libc::sigaddset(&mut set, SIGTERM);
    }

    let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &set, &mut previous) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }

    let result = f();

    let rc = unsafe { libc::pthread_sigmask(libc::SIG_SETMASK, &previous, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    #[test]
    fn test_sigterm_sets_flag() {
        let shutdown = install().unwrap();
        assert!(!shutdown.load(Ordering::SeqCst));

        signal_hook::low_level::raise(SIGTERM).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while !shutdown.load(Ordering::SeqCst) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(shutdown.load(Ordering::SeqCst));
    }

    /// `true` si `signal` está bloqueada en el thread actual
    fn is_blocked(signal: libc::c_int) -> io::Result<bool> {
        let mut current: libc::sigset_t = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, std::ptr::null(), &mut current) };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(unsafe { libc::sigismember(&current, signal) } == 1)
    }

    #[test]
    fn test_threads_spawned_while_blocked_inherit_mask() {
        let child = with_termination_blocked(|| {
            std::thread::spawn(|| (is_blocked(SIGTERM).unwrap(), is_blocked(SIGINT).unwrap()))
        })
        .unwrap();

        assert_eq!(child.join().unwrap(), (true, true));
        assert!(!is_blocked(SIGTERM).unwrap());
    }
}
