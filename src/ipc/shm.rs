//! # Memoria Compartida Anónima
//! src/ipc/shm.rs
//!
//! `ShmBox<T>` reserva un `T` en una región `mmap(MAP_SHARED | MAP_ANONYMOUS)`.
//! La región se hereda en cada `fork()`, así que master y workers ven los
//! mismos bytes.
//!
//! Solo el proceso que creó la región ejecuta el `Drop` de `T`; el resto
//! solo desmapea su vista. `T` debe ser plain-old-data `#[repr(C)]` sin
//! punteros a heap propio.

use std::io;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

pub struct ShmBox<T> {
    ptr: NonNull<T>,
    /// PID del proceso creador
    owner: u32,
    _marker: PhantomData<T>,
}

// Los accesos concurrentes al contenido los sincroniza quien use la región
// (semáforos o atómicos); el puntero en sí es válido en todos los threads.
unsafe impl<T: Send> Send for ShmBox<T> {}
unsafe impl<T: Send> Sync for ShmBox<T> {}

impl<T> ShmBox<T> {
    /// Mapea una región nueva y escribe `value` en ella
    pub fn new(value: T) -> io::Result<Self> {
        let len = std::mem::size_of::<T>().max(1);

        // SAFETY: mapeo anónimo nuevo, sin fd ni dirección fija
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        let ptr = NonNull::new(addr as *mut T).ok_or_else(|| io::Error::other("mmap returned null"))?;

        // SAFETY: la región es nueva, está alineada a página y mide al menos size_of::<T>()
        unsafe { ptr::write(ptr.as_ptr(), value) };

        Ok(Self {
            ptr,
            owner: std::process::id(),
            _marker: PhantomData,
        })
    }

    /// Puntero crudo al valor compartido
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// `true` en el proceso que creó la región
    pub fn is_owner(&self) -> bool {
        self.owner == std::process::id()
    }
}

impl<T> Drop for ShmBox<T> {
    fn drop(&mut self) {
        let len = std::mem::size_of::<T>().max(1);
        // SAFETY: el puntero viene de mmap con esta misma longitud
        unsafe {
            if self.is_owner() {
                ptr::drop_in_place(self.ptr.as_ptr());
            }
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    struct Pair {
        a: u64,
        b: u64,
    }

    #[test]
    fn test_write_and_read_back() {
        let shm = ShmBox::new(Pair { a: 1, b: 2 }).unwrap();
        unsafe {
            (*shm.as_ptr()).a += 10;
            assert_eq!((*shm.as_ptr()).a, 11);
            assert_eq!((*shm.as_ptr()).b, 2);
        }
        assert!(shm.is_owner());
    }

    #[test]
    fn test_visible_to_forked_child() {
        let shm = ShmBox::new(Pair { a: 0, b: 0 }).unwrap();

        // SAFETY: el hijo solo escribe en la región y termina con _exit
        let pid = unsafe { libc::fork() };
        assert!(pid >= 0);
        if pid == 0 {
            unsafe {
                (*shm.as_ptr()).a = 42;
                libc::_exit(0);
            }
        }

        let mut status = 0;
        unsafe { libc::waitpid(pid, &mut status, 0) };
        assert_eq!(unsafe { (*shm.as_ptr()).a }, 42);
    }
}
