//! # Lista LRU por tamaño
//! src/cache/lru.rs
//!
//! Estructura sin sincronización: un mapa `key -> slot` más una lista doble
//! enlazada sobre un slab de slots. `head` es la entrada más recientemente
//! usada y `tail` la menos reciente.
//!
//! Invariante: la suma de `size` de todas las entradas nunca supera
//! `capacity`.

use bytes::Bytes;
use std::collections::HashMap;

/// Una entrada de la cache
#[derive(Debug)]
pub struct CacheEntry {
    /// Path del recurso ya resuelto (incluye el root del virtual host)
    pub key: String,
    pub data: Bytes,
    pub size: usize,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Resultado de un `put`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// Entrada nueva; `evicted` entradas LRU salieron para hacerle lugar
    Inserted { evicted: usize },
    /// La clave ya existía: datos reemplazados y promovida a la cabeza
    Replaced { evicted: usize },
    /// La entrada es más grande que toda la cache; no se almacena
    Bypassed,
}

#[derive(Debug)]
pub struct LruList {
    index: HashMap<String, usize>,
    slots: Vec<Option<CacheEntry>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
    current_size: usize,
}

impl LruList {
    pub fn new(capacity: usize) -> Self {
        Self {
            index: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            capacity,
            current_size: 0,
        }
    }

    /// Busca una clave y la promueve a la cabeza
    pub fn get(&mut self, key: &str) -> Option<Bytes> {
        let slot = *self.index.get(key)?;
        self.unlink(slot);
        self.push_front(slot);
        self.entry(slot).map(|e| e.data.clone())
    }

    /// Inserta o reemplaza y promueve a la cabeza, desalojando desde la cola
    /// hasta que la nueva entrada quepa
    pub fn put(&mut self, key: &str, data: Bytes) -> PutOutcome {
        let size = data.len();
        if size > self.capacity {
            // Una versión anterior ya no es válida
            self.remove(key);
            return PutOutcome::Bypassed;
        }

        let replaced = self.remove(key).is_some();

        let mut evicted = 0;
        while self.current_size + size > self.capacity {
            match self.tail {
                Some(tail) => {
                    self.release(tail);
                    evicted += 1;
                }
                None => break,
            }
        }

        let entry = CacheEntry {
            key: key.to_string(),
            data,
            size,
            prev: None,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };
        self.index.insert(key.to_string(), slot);
        self.push_front(slot);
        self.current_size += size;

        if replaced {
            PutOutcome::Replaced { evicted }
        } else {
            PutOutcome::Inserted { evicted }
        }
    }

    /// Quita una clave, retornando sus datos
    pub fn remove(&mut self, key: &str) -> Option<Bytes> {
        let slot = *self.index.get(key)?;
        self.release(slot).map(|e| e.data)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn current_size(&self) -> usize {
        self.current_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Claves en orden MRU -> LRU
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            match self.entry(slot) {
                Some(entry) => {
                    keys.push(entry.key.clone());
                    cursor = entry.next;
                }
                None => break,
            }
        }
        keys
    }

    fn entry(&self, slot: usize) -> Option<&CacheEntry> {
        self.slots.get(slot).and_then(|s| s.as_ref())
    }

    fn entry_mut(&mut self, slot: usize) -> Option<&mut CacheEntry> {
        self.slots.get_mut(slot).and_then(|s| s.as_mut())
    }

    /// Desengancha el slot de la lista, lo libera y descuenta su tamaño
    fn release(&mut self, slot: usize) -> Option<CacheEntry> {
        self.unlink(slot);
        let entry = self.slots.get_mut(slot)?.take()?;
        self.index.remove(&entry.key);
        self.free.push(slot);
        self.current_size -= entry.size;
        Some(entry)
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = match self.entry(slot) {
            Some(e) => (e.prev, e.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(e) = self.entry_mut(p) {
                    e.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(e) = self.entry_mut(n) {
                    e.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(e) = self.entry_mut(slot) {
            e.prev = None;
            e.next = None;
        }
    }

    fn push_front(&mut self, slot: usize) {
        let old_head = self.head;
        if let Some(e) = self.entry_mut(slot) {
            e.prev = None;
            e.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(e) = self.entry_mut(h) {
                e.prev = Some(slot);
            }
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }
}
