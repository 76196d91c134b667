//! Compiled specializations.
//!
//! An artifact is one instantiated module: its store, the `env.memory` it
//! was handed, and the typed `"bitblt"` entry. The artifact owns the
//! memory-transfer protocol: both bitmaps are staged into linear memory as
//! little-endian words (source at byte 0, destination right after), the
//! entry runs over those offsets, and the destination range is read back.
//!
//! Artifacts live in the specialization cache and are reused for every call
//! with the same fingerprint; the state mutex serializes callers.

use std::sync::Mutex;

use bitblt_encoder::{MEMORY_MAX_PAGES, PAGE_SIZE};
use wasmtime::{Extern, Instance, Memory, MemoryType, Module, SharedMemory, Store, TypedFunc};

use crate::error::{Error, Result};
use crate::params::BlitOp;

/// The eleven i32 entry parameters: two byte base addresses and the nine
/// geometry values.
type EntryParams = (u32, u32, u32, u32, u32, u32, u32, u32, u32, u32, u32);

enum LinearMemory {
    Exclusive(Memory),
    Shared(SharedMemory),
}

struct InstanceState {
    store: Store<()>,
    memory: LinearMemory,
    entry: TypedFunc<EntryParams, ()>,
}

/// One compiled, instantiated specialization.
pub struct CompiledBlit {
    backend: &'static str,
    state: Mutex<InstanceState>,
}

impl CompiledBlit {
    /// Compiles `bytes` (already validated) and instantiates it with a
    /// fresh memory of the requested kind.
    pub(crate) fn instantiate(
        engine: &wasmtime::Engine,
        bytes: &[u8],
        shared: bool,
        backend: &'static str,
    ) -> Result<CompiledBlit> {
        let fail = |source: wasmtime::Error| Error::Instantiation {
            backend,
            source: source.into(),
        };
        let module = Module::new(engine, bytes).map_err(fail)?;
        let mut store = Store::new(engine, ());
        let (memory, import) = if shared {
            let memory = SharedMemory::new(
                engine,
                MemoryType::shared(bitblt_encoder::MEMORY_MIN_PAGES, MEMORY_MAX_PAGES),
            )
            .map_err(fail)?;
            (
                LinearMemory::Shared(memory.clone()),
                Extern::SharedMemory(memory),
            )
        } else {
            let memory = Memory::new(
                &mut store,
                MemoryType::new(bitblt_encoder::MEMORY_MIN_PAGES, Some(MEMORY_MAX_PAGES)),
            )
            .map_err(fail)?;
            (LinearMemory::Exclusive(memory), Extern::Memory(memory))
        };
        let instance = Instance::new(&mut store, &module, &[import]).map_err(fail)?;
        let entry = instance
            .get_typed_func::<EntryParams, ()>(&mut store, bitblt_encoder::ENTRY_NAME)
            .map_err(fail)?;
        Ok(CompiledBlit {
            backend,
            state: Mutex::new(InstanceState { store, memory, entry }),
        })
    }

    /// Runs the specialization over separate source and destination
    /// buffers.
    pub fn call(&self, src: &[u32], dst: &mut [u32], op: &BlitOp) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let dst_base = 4 * src.len();
        state.ensure_capacity(dst_base + 4 * dst.len(), self.backend)?;
        state.write_words(0, src);
        state.write_words(dst_base, dst);
        state.invoke(0, dst_base as u32, op, self.backend)?;
        state.read_words(dst_base, dst);
        Ok(())
    }

    /// Runs the specialization with source and destination aliased to the
    /// same buffer, staged once at offset 0. The emitted forward scan then
    /// operates on truly aliased rows, matching the reference's order for
    /// overlapping rectangles.
    pub fn call_in_place(&self, buf: &mut [u32], op: &BlitOp) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.ensure_capacity(4 * buf.len(), self.backend)?;
        state.write_words(0, buf);
        state.invoke(0, 0, op, self.backend)?;
        state.read_words(0, buf);
        Ok(())
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }
}

impl InstanceState {
    fn data_len(&self) -> usize {
        match &self.memory {
            LinearMemory::Exclusive(memory) => memory.data_size(&self.store),
            LinearMemory::Shared(memory) => memory.data().len(),
        }
    }

    /// Grows the memory until it holds `needed` bytes; the import caps it
    /// at [`MEMORY_MAX_PAGES`] pages.
    fn ensure_capacity(&mut self, needed: usize, backend: &'static str) -> Result<()> {
        let limit = (MEMORY_MAX_PAGES * PAGE_SIZE) as usize;
        if needed > limit {
            return Err(Error::MemoryCapacity {
                required_bytes: needed,
                limit_bytes: limit,
            });
        }
        let current = self.data_len();
        if needed <= current {
            return Ok(());
        }
        let delta = u64::from((needed - current).div_ceil(PAGE_SIZE as usize) as u32);
        log::trace!("growing {backend} artifact memory by {delta} pages");
        let grown = match &self.memory {
            LinearMemory::Exclusive(memory) => memory.grow(&mut self.store, delta),
            LinearMemory::Shared(memory) => memory.grow(delta),
        };
        grown.map_err(|_| Error::MemoryCapacity {
            required_bytes: needed,
            limit_bytes: limit,
        })?;
        Ok(())
    }

    fn write_words(&mut self, offset: usize, words: &[u32]) {
        match &self.memory {
            LinearMemory::Exclusive(memory) => {
                let data = memory.data_mut(&mut self.store);
                for (i, word) in words.iter().enumerate() {
                    let at = offset + 4 * i;
                    data[at..at + 4].copy_from_slice(&word.to_le_bytes());
                }
            }
            LinearMemory::Shared(memory) => {
                let cells = memory.data();
                assert!(offset + 4 * words.len() <= cells.len());
                // SAFETY: in-bounds per the assert above, and nothing else
                // touches this instance's memory while the state mutex is
                // held: no wasm code is running and the memory is never
                // handed to another instance.
                unsafe {
                    let base = (cells.as_ptr() as *mut u8).add(offset);
                    for (i, word) in words.iter().enumerate() {
                        let bytes = word.to_le_bytes();
                        std::ptr::copy_nonoverlapping(bytes.as_ptr(), base.add(4 * i), 4);
                    }
                }
            }
        }
    }

    fn read_words(&mut self, offset: usize, words: &mut [u32]) {
        match &self.memory {
            LinearMemory::Exclusive(memory) => {
                let data = memory.data(&self.store);
                for (i, word) in words.iter_mut().enumerate() {
                    let at = offset + 4 * i;
                    *word = u32::from_le_bytes(data[at..at + 4].try_into().unwrap());
                }
            }
            LinearMemory::Shared(memory) => {
                let cells = memory.data();
                assert!(offset + 4 * words.len() <= cells.len());
                // SAFETY: as in `write_words`.
                unsafe {
                    let base = (cells.as_ptr() as *const u8).add(offset);
                    for (i, word) in words.iter_mut().enumerate() {
                        let mut bytes = [0u8; 4];
                        std::ptr::copy_nonoverlapping(base.add(4 * i), bytes.as_mut_ptr(), 4);
                        *word = u32::from_le_bytes(bytes);
                    }
                }
            }
        }
    }

    fn invoke(
        &mut self,
        src_base: u32,
        dst_base: u32,
        op: &BlitOp,
        backend: &'static str,
    ) -> Result<()> {
        self.entry
            .call(
                &mut self.store,
                (
                    src_base, op.src_w, op.src_h, op.src_x, op.src_y, dst_base, op.dst_w,
                    op.dst_x, op.dst_y, op.width, op.height,
                ),
            )
            .map_err(|source| Error::Execution {
                backend,
                source: source.into(),
            })
    }
}
