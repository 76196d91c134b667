//! The textual back-end: emits the scan loop as WAT source and materializes
//! it through the in-process assembler.
//!
//! Frozen dimensions can be inlined as literals at every use
//! (`inline_constants`), which also folds a stride to a constant once its
//! width is known. With a frozen height, `unroll` replaces the row loop by
//! one block per row with suffixed local names; if the width is frozen too,
//! the pixel loop unrolls as well and every temporary gets a per-pixel
//! name.

use std::sync::Arc;

use crate::artifact::CompiledBlit;
use crate::backend::{ArtifactSource, Backend, BackendKind, validate_module};
use crate::cache::{CacheStats, SpecializationCache};
use crate::error::{Error, Result};
use crate::params::CompileParams;

pub(crate) struct TextualBackend {
    engine: wasmtime::Engine,
    cache: SpecializationCache,
}

impl TextualBackend {
    pub fn new(engine: wasmtime::Engine) -> Self {
        Self { engine, cache: SpecializationCache::default() }
    }

    /// Replaces the cached artifact under `key`, bypassing generation.
    #[cfg(test)]
    pub fn seed(&self, key: &str, artifact: CompiledBlit) {
        self.cache.insert(key, artifact);
    }
}

impl Backend for TextualBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Textual
    }

    fn generate(&self, params: &CompileParams) -> Result<ArtifactSource> {
        Ok(ArtifactSource::Text(emit_wat(params)))
    }

    fn compile(&self, params: &CompileParams) -> Result<Arc<CompiledBlit>> {
        let key = self.fingerprint(params);
        self.cache.get_or_compile(&key, || {
            let source = emit_wat(params);
            if params.flags.debug {
                log::debug!("generated source for {key}:\n{source}");
            }
            let bytes = wat::parse_str(&source).map_err(|source| Error::Generation {
                backend: "textual",
                source: source.into(),
            })?;
            validate_module(&bytes).map_err(|source| Error::Generation {
                backend: "textual",
                source: source.into(),
            })?;
            CompiledBlit::instantiate(&self.engine, &bytes, false, "textual")
        })
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn cst(value: u32) -> String {
    format!("(i32.const {value})")
}

fn get(local: &str) -> String {
    format!("(local.get ${local})")
}

fn add(a: &str, b: &str) -> String {
    format!("(i32.add {a} {b})")
}

struct WatEmitter<'a> {
    p: &'a CompileParams,
    out: String,
}

impl<'a> WatEmitter<'a> {
    fn new(p: &'a CompileParams) -> Self {
        Self { p, out: String::with_capacity(2048) }
    }

    fn inline(&self) -> bool {
        self.p.flags.inline_constants
    }

    fn line(&mut self, indent: usize, text: &str) {
        for _ in 0..indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn set(&mut self, indent: usize, local: &str, expr: &str) {
        self.line(indent, &format!("(local.set ${local} {expr})"));
    }

    /// A dimension at its use site: a literal when frozen and inlining,
    /// the parameter otherwise.
    fn dim(&self, name: &str, value: Option<u32>) -> String {
        match value {
            Some(v) if self.inline() => cst(v),
            _ => get(name),
        }
    }

    /// A dimension plus a constant offset, folded when possible.
    fn dim_plus(&self, name: &str, value: Option<u32>, offset: u32) -> String {
        match value {
            Some(v) if self.inline() => cst(v + offset),
            _ if offset == 0 => get(name),
            _ => add(&get(name), &cst(offset)),
        }
    }

    fn src_stride_folded(&self) -> bool {
        self.inline() && self.p.src_w.is_some()
    }

    fn dst_stride_folded(&self) -> bool {
        self.inline() && self.p.dst_w.is_some()
    }

    fn src_stride(&self) -> String {
        match self.p.src_w {
            Some(w) if self.inline() => cst(w.div_ceil(32)),
            _ => get("srcStrideWords"),
        }
    }

    fn dst_stride(&self) -> String {
        match self.p.dst_w {
            Some(w) if self.inline() => cst(w.div_ceil(32)),
            _ => get("dstStrideWords"),
        }
    }

    /// Byte address of the word holding the pixel whose absolute x lives in
    /// `$x_abs`, in row `y_expr` of the buffer based at `$ptr`.
    fn word_addr(&self, ptr: &str, x_abs: &str, y_expr: &str, stride: &str) -> String {
        format!(
            "(i32.add (local.get ${ptr}) (i32.shl (i32.add (i32.shr_u (local.get ${x_abs}) \
             (i32.const 5)) (i32.mul {y_expr} {stride})) (i32.const 2)))"
        )
    }

    /// The per-pixel sequence: extract the source bit, mask it into the
    /// destination word, store it back. `sfx` distinguishes unrolled
    /// copies of the temporaries.
    fn pixel(
        &mut self,
        indent: usize,
        sfx: &str,
        src_y: &str,
        dst_y: &str,
        src_x_init: &str,
        dst_x_init: &str,
    ) {
        let src_x_abs = format!("srcXAbs{sfx}");
        let dst_x_abs = format!("dstXAbs{sfx}");
        let src_bit = format!("srcBit{sfx}");
        let dst_bit_pos = format!("dstBitPos{sfx}");
        let dst_addr = format!("dstAddr{sfx}");
        let word_tmp = format!("wordTmp{sfx}");

        self.set(indent, &src_x_abs, src_x_init);
        self.set(indent, &dst_x_abs, dst_x_init);

        let src_stride = self.src_stride();
        let src_word = self.word_addr("srcPtr", &src_x_abs, src_y, &src_stride);
        self.set(
            indent,
            &src_bit,
            &format!(
                "(i32.and (i32.shr_u (i32.load {src_word}) (i32.and (local.get ${src_x_abs}) \
                 (i32.const 31))) (i32.const 1))"
            ),
        );
        self.set(
            indent,
            &dst_bit_pos,
            &format!("(i32.and (local.get ${dst_x_abs}) (i32.const 31))"),
        );
        let dst_stride = self.dst_stride();
        let dst_word = self.word_addr("dstPtr", &dst_x_abs, dst_y, &dst_stride);
        self.set(indent, &dst_addr, &dst_word);
        self.set(indent, &word_tmp, &format!("(i32.load (local.get ${dst_addr}))"));

        self.line(indent, &format!("(if (local.get ${src_bit})"));
        self.line(
            indent + 1,
            &format!(
                "(then (local.set ${word_tmp} (i32.or (local.get ${word_tmp}) (i32.shl \
                 (i32.const 1) (local.get ${dst_bit_pos})))))"
            ),
        );
        self.line(
            indent + 1,
            &format!(
                "(else (local.set ${word_tmp} (i32.and (local.get ${word_tmp}) (i32.xor \
                 (i32.shl (i32.const 1) (local.get ${dst_bit_pos})) (i32.const -1))))))"
            ),
        );
        self.line(
            indent,
            &format!("(i32.store (local.get ${dst_addr}) (local.get ${word_tmp}))"),
        );
    }

    /// `(br_if $label (i32.eqz (i32.lt_u counter bound)))`
    fn guard(&mut self, indent: usize, label: &str, counter: &str, bound: &str) {
        self.line(
            indent,
            &format!("(br_if ${label} (i32.eqz (i32.lt_u (local.get ${counter}) {bound})))"),
        );
    }

    fn emit(mut self) -> String {
        let unroll_rows = self.p.flags.unroll && self.p.height.is_some();
        let unroll_pixels = unroll_rows && self.p.width.is_some();

        self.line(0, "(module");
        self.line(1, "(import \"env\" \"memory\" (memory 1 16))");
        self.line(1, "(func (export \"bitblt\")");
        self.line(2, "(param $srcPtr i32) (param $srcW i32) (param $srcH i32)");
        self.line(2, "(param $srcX i32) (param $srcY i32)");
        self.line(2, "(param $dstPtr i32) (param $dstW i32)");
        self.line(2, "(param $dstX i32) (param $dstY i32)");
        self.line(2, "(param $width i32) (param $height i32)");

        // Locals for whichever shape is being emitted.
        if !self.src_stride_folded() {
            self.line(2, "(local $srcStrideWords i32)");
        }
        if !self.dst_stride_folded() {
            self.line(2, "(local $dstStrideWords i32)");
        }
        if unroll_rows {
            let height = self.p.height.unwrap();
            for k in 0..height {
                self.line(2, &format!("(local $srcYAbs_{k} i32) (local $dstYAbs_{k} i32)"));
            }
        } else {
            self.line(2, "(local $y i32)");
            self.line(2, "(local $srcYAbs i32) (local $dstYAbs i32)");
        }
        if unroll_pixels {
            let pixels = self.p.width.unwrap() * self.p.height.unwrap();
            for n in 0..pixels {
                self.line(
                    2,
                    &format!(
                        "(local $srcXAbs_{n} i32) (local $dstXAbs_{n} i32) (local $srcBit_{n} \
                         i32) (local $dstBitPos_{n} i32) (local $dstAddr_{n} i32) (local \
                         $wordTmp_{n} i32)"
                    ),
                );
            }
        } else {
            self.line(2, "(local $x i32)");
            self.line(2, "(local $srcXAbs i32) (local $dstXAbs i32)");
            self.line(2, "(local $srcBit i32) (local $dstBitPos i32)");
            self.line(2, "(local $dstAddr i32) (local $wordTmp i32)");
        }

        if !self.src_stride_folded() {
            let src_w = self.dim("srcW", self.p.src_w);
            self.set(
                2,
                "srcStrideWords",
                &format!("(i32.shr_u (i32.add {src_w} (i32.const 31)) (i32.const 5))"),
            );
        }
        if !self.dst_stride_folded() {
            let dst_w = self.dim("dstW", self.p.dst_w);
            self.set(
                2,
                "dstStrideWords",
                &format!("(i32.shr_u (i32.add {dst_w} (i32.const 31)) (i32.const 5))"),
            );
        }

        if unroll_rows {
            self.emit_unrolled_rows(unroll_pixels);
        } else {
            self.emit_row_loop();
        }

        self.line(1, ")");
        self.line(0, ")");
        self.out
    }

    fn emit_row_loop(&mut self) {
        let height = self.dim("height", self.p.height);
        let width = self.dim("width", self.p.width);

        self.line(2, "(block $rowsDone");
        self.line(3, "(loop $rows");
        self.guard(4, "rowsDone", "y", &height);
        let src_y = self.dim("srcY", self.p.src_y);
        let dst_y = self.dim("dstY", self.p.dst_y);
        self.set(4, "srcYAbs", &add(&src_y, &get("y")));
        self.set(4, "dstYAbs", &add(&dst_y, &get("y")));
        self.set(4, "x", &cst(0));
        self.line(4, "(block $colsDone");
        self.line(5, "(loop $cols");
        self.guard(6, "colsDone", "x", &width);
        let src_x = self.dim("srcX", self.p.src_x);
        let dst_x = self.dim("dstX", self.p.dst_x);
        self.pixel(
            6,
            "",
            &get("srcYAbs"),
            &get("dstYAbs"),
            &add(&src_x, &get("x")),
            &add(&dst_x, &get("x")),
        );
        self.set(6, "x", &add(&get("x"), &cst(1)));
        self.line(6, "(br $cols)))");
        self.set(4, "y", &add(&get("y"), &cst(1)));
        self.line(4, "(br $rows)))");
    }

    fn emit_unrolled_rows(&mut self, unroll_pixels: bool) {
        let height = self.p.height.unwrap();
        for k in 0..height {
            let src_y_abs = format!("srcYAbs_{k}");
            let dst_y_abs = format!("dstYAbs_{k}");
            let src_y = self.dim_plus("srcY", self.p.src_y, k);
            let dst_y = self.dim_plus("dstY", self.p.dst_y, k);
            self.set(2, &src_y_abs, &src_y);
            self.set(2, &dst_y_abs, &dst_y);

            if unroll_pixels {
                let width = self.p.width.unwrap();
                for j in 0..width {
                    let n = k * width + j;
                    let src_x = self.dim_plus("srcX", self.p.src_x, j);
                    let dst_x = self.dim_plus("dstX", self.p.dst_x, j);
                    let sfx = format!("_{n}");
                    self.pixel(
                        2,
                        &sfx,
                        &get(&src_y_abs),
                        &get(&dst_y_abs),
                        &src_x,
                        &dst_x,
                    );
                }
            } else {
                let width = self.dim("width", self.p.width);
                let done = format!("colsDone_{k}");
                let again = format!("cols_{k}");
                self.set(2, "x", &cst(0));
                self.line(2, &format!("(block ${done}"));
                self.line(3, &format!("(loop ${again}"));
                self.guard(4, &done, "x", &width);
                let src_x = self.dim("srcX", self.p.src_x);
                let dst_x = self.dim("dstX", self.p.dst_x);
                self.pixel(
                    4,
                    "",
                    &get(&src_y_abs),
                    &get(&dst_y_abs),
                    &add(&src_x, &get("x")),
                    &add(&dst_x, &get("x")),
                );
                self.set(4, "x", &add(&get("x"), &cst(1)));
                self.line(4, &format!("(br ${again})))"));
            }
        }
    }
}

/// Emits the complete module source for one parameter record.
pub(crate) fn emit_wat(params: &CompileParams) -> String {
    WatEmitter::new(params).emit()
}
