//! Top-level dispatch.
//!
//! One call runs, in order: configuration snapshot, bounds validation,
//! (optionally) the analyzer, back-end selection, cache lookup or
//! compilation, the oracle shadow onto a scratch copy when verifying, the
//! specialized routine itself, and the pixel-level comparison. The engine
//! owns the wasmtime runtime every artifact instantiates against, and one
//! back-end instance (with its cache) per kind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::analyze::{self, OptFlags};
use crate::backend::{Backend, BackendKind, new_backend};
use crate::bitmap::{first_pixel_mismatch, rows};
use crate::cache::CacheStats;
use crate::config::{CallOptions, Config};
use crate::error::{Error, Result};
use crate::params::{BlitOp, CompileParams};
use crate::reference;

/// The specialization engine. Cheap to call through, expensive on first
/// contact with a new operation shape.
pub struct Engine {
    config: Config,
    wasm: wasmtime::Engine,
    backends: Mutex<HashMap<BackendKind, Arc<dyn Backend>>>,
}

enum Buffers<'a> {
    Split { src: &'a [u32], dst: &'a mut [u32] },
    InPlace(&'a mut [u32]),
}

impl Engine {
    pub fn new(config: &Config) -> Result<Engine> {
        let mut wasm_config = wasmtime::Config::new();
        wasm_config.wasm_threads(true);
        wasm_config.shared_memory(true);
        let wasm = wasmtime::Engine::new(&wasm_config).map_err(|source| Error::Instantiation {
            backend: "runtime",
            source: source.into(),
        })?;
        Ok(Engine {
            config: config.clone(),
            wasm,
            backends: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Copies a rectangle between two distinct buffers. The destination is
    /// written only inside the rectangle.
    pub fn bitblt(&self, src: &[u32], dst: &mut [u32], op: &BlitOp) -> Result<()> {
        self.dispatch(Buffers::Split { src, dst }, op, None)
    }

    /// [`Engine::bitblt`] with per-call configuration overrides.
    pub fn bitblt_with(
        &self,
        src: &[u32],
        dst: &mut [u32],
        op: &BlitOp,
        options: &CallOptions,
    ) -> Result<()> {
        self.dispatch(Buffers::Split { src, dst }, op, Some(options))
    }

    /// The aliased form: source and destination rectangles live in `buf`.
    /// Overlapping rectangles see the reference's forward row-major order.
    pub fn bitblt_in_place(&self, buf: &mut [u32], op: &BlitOp) -> Result<()> {
        self.dispatch(Buffers::InPlace(buf), op, None)
    }

    /// [`Engine::bitblt_in_place`] with per-call configuration overrides.
    pub fn bitblt_in_place_with(
        &self,
        buf: &mut [u32],
        op: &BlitOp,
        options: &CallOptions,
    ) -> Result<()> {
        self.dispatch(Buffers::InPlace(buf), op, Some(options))
    }

    /// The engine's back-end of the given kind, created on first use.
    pub fn backend(&self, kind: BackendKind) -> Arc<dyn Backend> {
        let mut backends = self.backends.lock().unwrap();
        backends
            .entry(kind)
            .or_insert_with(|| Arc::from(new_backend(kind, &self.wasm)))
            .clone()
    }

    /// Drops every cached artifact of every back-end.
    pub fn clear_cache(&self) {
        for backend in self.backends.lock().unwrap().values() {
            backend.clear_cache();
        }
    }

    pub fn cache_stats(&self, kind: BackendKind) -> CacheStats {
        self.backend(kind).cache_stats()
    }

    #[cfg(test)]
    fn install_backend(&self, kind: BackendKind, backend: Arc<dyn Backend>) {
        self.backends.lock().unwrap().insert(kind, backend);
    }

    fn dispatch(&self, mut bufs: Buffers<'_>, op: &BlitOp, options: Option<&CallOptions>) -> Result<()> {
        let config = match options {
            Some(options) => options.apply(&self.config),
            None => self.config.clone(),
        };

        if op.width == 0 || op.height == 0 {
            return Ok(());
        }
        validate_bounds(&bufs, op)?;

        if !config.use_specialized {
            match &mut bufs {
                Buffers::Split { src, dst } => reference::blit(src, dst, op),
                Buffers::InPlace(buf) => reference::blit_in_place(buf, op),
            }
            return Ok(());
        }

        let mut params = CompileParams::freeze_all(op, config.compiler);
        if config.analyze {
            let analysis = analyze::analyze(&params);
            log::trace!("analysis: {:?} (can_optimize = {})", analysis.flags, analysis.can_optimize);
            if config.autospecialize {
                if analysis.flags.contains(OptFlags::UNROLL_SMALL) {
                    params.flags.unroll = true;
                }
                if analysis.flags.contains(OptFlags::WORD_ALIGNED) {
                    params.flags.align_opt = true;
                }
            }
        }

        let mut kind = config.back_end;
        if kind == BackendKind::AlignedBinary && !analyze::word_aligned(&params) {
            log::warn!(
                "aligned-binary back-end requested for a non-word-aligned operation; \
                 falling back to binary"
            );
            kind = BackendKind::Binary;
        }

        let backend = self.backend(kind);
        let key = backend.fingerprint(&params);
        let start = config.log_perf.then(Instant::now);
        let artifact = backend.compile(&params)?;

        // The oracle runs first, onto a scratch copy of the destination;
        // the specialized routine then writes the real one.
        let expected = config.verify.then(|| match &bufs {
            Buffers::Split { src, dst } => {
                let mut scratch = dst.to_vec();
                reference::blit(src, &mut scratch, op);
                scratch
            }
            Buffers::InPlace(buf) => {
                let mut scratch = buf.to_vec();
                reference::blit_in_place(&mut scratch, op);
                scratch
            }
        });

        match &mut bufs {
            Buffers::Split { src, dst } => artifact.call(src, dst, op)?,
            Buffers::InPlace(buf) => artifact.call_in_place(buf, op)?,
        }

        if let Some(expected) = expected {
            let actual = match &bufs {
                Buffers::Split { dst, .. } => &dst[..],
                Buffers::InPlace(buf) => &buf[..],
            };
            if let Some((x, y, e, a)) = first_pixel_mismatch(&expected, actual, op.dst_w) {
                return Err(Error::VerificationMismatch {
                    x,
                    y,
                    expected: e,
                    actual: a,
                });
            }
        }

        if let Some(start) = start {
            log::info!(
                "bitblt backend={kind} key={key} elapsed={:?}",
                start.elapsed()
            );
        }
        Ok(())
    }
}

fn validate_bounds(bufs: &Buffers<'_>, op: &BlitOp) -> Result<()> {
    match bufs {
        Buffers::Split { src, dst } => {
            check_rect(src.len(), op, Side::Source)?;
            check_rect(dst.len(), op, Side::Destination)
        }
        Buffers::InPlace(buf) => {
            check_rect(buf.len(), op, Side::Source)?;
            check_rect(buf.len(), op, Side::Destination)
        }
    }
}

enum Side {
    Source,
    Destination,
}

fn check_rect(len_words: usize, op: &BlitOp, side: Side) -> Result<()> {
    let (buffer, buf_w, x, y) = match side {
        Side::Source => ("source", op.src_w, op.src_x, op.src_y),
        Side::Destination => ("destination", op.dst_w, op.dst_x, op.dst_y),
    };
    // The source height is declared by the caller; the destination height
    // is whatever the buffer holds. Either way the buffer must back every
    // row the rectangle touches.
    let buf_h = match side {
        Side::Source => rows(len_words, buf_w).min(op.src_h),
        Side::Destination => rows(len_words, buf_w),
    };
    let fits_x = u64::from(x) + u64::from(op.width) <= u64::from(buf_w);
    let fits_y = u64::from(y) + u64::from(op.height) <= u64::from(buf_h);
    if fits_x && fits_y {
        Ok(())
    } else {
        Err(Error::OutOfRange {
            buffer,
            x,
            y,
            width: op.width,
            height: op.height,
            bounds_w: buf_w,
            bounds_h: buf_h,
        })
    }
}
