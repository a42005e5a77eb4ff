//! Contadores compartidos entre procesos
//! tests/shared_stats.rs
//!
//! Varios hijos creados con `fork()` registran intercambios sobre el mismo
//! segmento; el padre verifica que no se pierde ninguna actualización.

use concurrent_http::http::StatusCode;
use concurrent_http::ipc::SyncSet;
use concurrent_http::stats::{Exchange, SharedStats};
use std::sync::Arc;
use std::time::Duration;

const CHILDREN: usize = 4;
const PER_CHILD: u64 = 2_000;

#[test]
fn test_no_lost_updates_across_processes() {
    let sync = Arc::new(SyncSet::create().unwrap());
    let stats = SharedStats::create(Arc::clone(&sync)).unwrap();

    let exchange = Exchange {
        status: StatusCode::Ok,
        bytes: 10,
        latency: Duration::from_micros(5),
        cache_hit: false,
    };

    let mut children = Vec::new();
    for _ in 0..CHILDREN {
        match unsafe { libc::fork() } {
            -1 => panic!("fork failed: {}", std::io::Error::last_os_error()),
            0 => {
                // Solo memoria compartida y semáforos en el hijo
                let mut code = 0;
                for _ in 0..PER_CHILD {
                    if stats.connection_opened().is_err()
                        || stats.record_exchange(&exchange).is_err()
                        || stats.connection_closed().is_err()
                    {
                        code = 1;
                        break;
                    }
                }
                unsafe { libc::_exit(code) };
            }
            pid => children.push(pid),
        }
    }

    for pid in children {
        let mut status = 0;
        assert_eq!(unsafe { libc::waitpid(pid, &mut status, 0) }, pid);
        assert!(libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0);
    }

    let counters = stats.snapshot().unwrap().counters;
    let total = CHILDREN as u64 * PER_CHILD;
    assert_eq!(counters.total_requests, total);
    assert_eq!(counters.status_200, total);
    assert_eq!(counters.bytes_transferred, total * 10);
    assert_eq!(counters.total_response_time_us, total * 5);
    assert_eq!(counters.active_connections, 0);
}

#[test]
fn test_accept_mutex_handoff_between_processes() {
    let sync = Arc::new(SyncSet::create().unwrap());

    // El hijo espera el mutex que tiene el padre
    let guard = sync.accept.lock().unwrap();
    match unsafe { libc::fork() } {
        -1 => panic!("fork failed"),
        0 => {
            let code = match sync.accept.lock_timeout(Duration::from_secs(5)) {
                Ok(Some(_guard)) => 0,
                _ => 1,
            };
            unsafe { libc::_exit(code) };
        }
        pid => {
            std::thread::sleep(Duration::from_millis(100));
            drop(guard);

            let mut status = 0;
            assert_eq!(unsafe { libc::waitpid(pid, &mut status, 0) }, pid);
            assert_eq!(libc::WEXITSTATUS(status), 0);
        }
    }
}
