//! The binary back-end: assembles module bytes directly.
//!
//! Comes in two flavors behind one struct. The plain flavor imports
//! exclusive memory and emits the scalar pixel loop, switching to the
//! whole-word body when `align_opt` is set and the operation is analyzed as
//! word-aligned. The aligned flavor imports shared memory and emits the
//! whole-word body unconditionally; its preconditions (word alignment)
//! are the dispatcher's to establish, and it refuses shapes that break
//! them.

use std::sync::Arc;

use bitblt_encoder::{MemoryImport, assemble, body};

use crate::analyze::word_aligned;
use crate::artifact::CompiledBlit;
use crate::backend::{ArtifactSource, Backend, BackendKind, validate_module};
use crate::cache::{CacheStats, SpecializationCache};
use crate::error::{Error, Result};
use crate::params::CompileParams;

pub(crate) struct BinaryBackend {
    engine: wasmtime::Engine,
    cache: SpecializationCache,
    shared: bool,
}

impl BinaryBackend {
    pub fn new(engine: wasmtime::Engine, shared: bool) -> Self {
        Self { engine, cache: SpecializationCache::default(), shared }
    }

    fn emit(&self, params: &CompileParams) -> Result<Vec<u8>> {
        let aligned = word_aligned(params);
        if self.shared && !aligned {
            return Err(Error::Unsupported(
                "the aligned-binary back-end needs width, srcX and dstX frozen to \
                 multiples of 32"
                    .to_string(),
            ));
        }
        let body = if aligned && (self.shared || params.flags.align_opt) {
            body::word_aligned()
        } else {
            body::scalar()
        };
        let memory = if self.shared {
            MemoryImport::Shared
        } else {
            MemoryImport::Exclusive
        };
        Ok(assemble(&body, memory))
    }
}

impl Backend for BinaryBackend {
    fn kind(&self) -> BackendKind {
        if self.shared {
            BackendKind::AlignedBinary
        } else {
            BackendKind::Binary
        }
    }

    fn generate(&self, params: &CompileParams) -> Result<ArtifactSource> {
        Ok(ArtifactSource::Binary(self.emit(params)?))
    }

    fn compile(&self, params: &CompileParams) -> Result<Arc<CompiledBlit>> {
        let key = self.fingerprint(params);
        let name = self.name();
        self.cache.get_or_compile(&key, || {
            let bytes = self.emit(params)?;
            validate_module(&bytes).map_err(|source| Error::Generation {
                backend: name,
                source: source.into(),
            })?;
            if params.flags.debug {
                match wasmprinter::print_bytes(&bytes) {
                    Ok(text) => log::debug!("generated module for {key}:\n{text}"),
                    Err(err) => log::debug!("generated module for {key} does not print: {err}"),
                }
            }
            CompiledBlit::instantiate(&self.engine, &bytes, self.shared, name)
        })
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
