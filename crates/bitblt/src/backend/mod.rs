//! Code-generating back-ends.
//!
//! A back-end turns a [`CompileParams`] record into a runnable artifact.
//! Two generators exist, a textual one emitting WAT source and a binary
//! one assembling module bytes directly, and the binary one comes in an
//! aligned flavor that imports shared memory and moves whole words. All of
//! them cache per fingerprint and answer the same capability set, so the
//! dispatcher treats them uniformly.

use std::fmt;
use std::sync::Arc;

use wasmparser::{Validator, WasmFeatures};

use crate::analyze::{self, Analysis};
use crate::artifact::CompiledBlit;
use crate::cache::{self, CacheStats};
use crate::error::{Error, Result};
use crate::params::{BlitOp, CompileParams, CompilerFlags};

mod binary;
mod textual;

pub(crate) use binary::BinaryBackend;
pub(crate) use textual::TextualBackend;

/// The available generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// WAT source, materialized through the in-process assembler.
    Textual,
    /// Hand-assembled module bytes over exclusive memory.
    Binary,
    /// Hand-assembled module bytes over shared memory, whole-word copies
    /// only.
    AlignedBinary,
}

impl BackendKind {
    /// Resolves a configuration name, accepting the common aliases.
    pub fn from_name(name: &str) -> Result<BackendKind> {
        match name {
            "textual" | "text" | "wat" => Ok(BackendKind::Textual),
            "binary" | "wasm" => Ok(BackendKind::Binary),
            "aligned-binary" | "aligned" => Ok(BackendKind::AlignedBinary),
            other => Err(Error::UnknownBackEnd(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Textual => "textual",
            BackendKind::Binary => "binary",
            BackendKind::AlignedBinary => "aligned-binary",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What `generate` hands back before materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// WAT source text.
    Text(String),
    /// Complete module bytes.
    Binary(Vec<u8>),
}

/// The capability set every back-end answers.
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Emits the artifact body for `params` without materializing it.
    fn generate(&self, params: &CompileParams) -> Result<ArtifactSource>;

    /// Returns the cached artifact for `params`, compiling it on first
    /// use.
    fn compile(&self, params: &CompileParams) -> Result<Arc<CompiledBlit>>;

    fn clear_cache(&self);

    fn cache_stats(&self) -> CacheStats;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// One-shot convenience: specialize on the full call shape and run.
    fn execute(&self, src: &[u32], dst: &mut [u32], op: &BlitOp) -> Result<()> {
        let params = CompileParams::freeze_all(op, CompilerFlags::default());
        self.compile(&params)?.call(src, dst, op)
    }

    fn fingerprint(&self, params: &CompileParams) -> String {
        cache::fingerprint(self.name(), params)
    }

    fn analyze(&self, params: &CompileParams) -> Analysis {
        analyze::analyze(params)
    }

    /// Whether compilation or execution completes deferred. This runtime
    /// compiles and instantiates synchronously, so every back-end says no;
    /// an async embedding would answer through the same capability.
    fn is_async(&self) -> bool {
        false
    }
}

/// Constructs the back-end `name` refers to, bound to `engine`.
pub fn create_backend(name: &str, engine: &wasmtime::Engine) -> Result<Box<dyn Backend>> {
    Ok(new_backend(BackendKind::from_name(name)?, engine))
}

pub(crate) fn new_backend(kind: BackendKind, engine: &wasmtime::Engine) -> Box<dyn Backend> {
    match kind {
        BackendKind::Textual => Box::new(TextualBackend::new(engine.clone())),
        BackendKind::Binary => Box::new(BinaryBackend::new(engine.clone(), false)),
        BackendKind::AlignedBinary => Box::new(BinaryBackend::new(engine.clone(), true)),
    }
}

/// Validates emitted module bytes against the feature set the engine runs
/// with. Generation failures are caught here, before wasmtime ever sees
/// the module.
pub(crate) fn validate_module(bytes: &[u8]) -> std::result::Result<(), wasmparser::BinaryReaderError> {
    let features = WasmFeatures::default() | WasmFeatures::THREADS | WasmFeatures::SIMD;
    Validator::new_with_features(features)
        .validate_all(bytes)
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_resolves_names_and_aliases() {
        for (name, kind) in [
            ("textual", BackendKind::Textual),
            ("text", BackendKind::Textual),
            ("wat", BackendKind::Textual),
            ("binary", BackendKind::Binary),
            ("wasm", BackendKind::Binary),
            ("aligned-binary", BackendKind::AlignedBinary),
            ("aligned", BackendKind::AlignedBinary),
        ] {
            assert_eq!(BackendKind::from_name(name).unwrap(), kind);
        }
    }

    #[test]
    fn factory_rejects_unknown_names() {
        match BackendKind::from_name("jit") {
            Err(Error::UnknownBackEnd(name)) => assert_eq!(name, "jit"),
            other => panic!("expected UnknownBackEnd, got {other:?}"),
        }
    }
}
