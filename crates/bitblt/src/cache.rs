//! Specialization fingerprints and the artifact cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::artifact::CompiledBlit;
use crate::error::Result;
use crate::params::CompileParams;

/// Builds the canonical cache key for a parameter record: the back-end
/// name, then a short tag and value for each frozen dimension in fixed
/// order, then the flags that change generated code. Unfrozen dimensions
/// are omitted, so records differing only in runtime-variable dimensions
/// collide; they share an artifact.
pub fn fingerprint(backend: &str, p: &CompileParams) -> String {
    let mut key = String::with_capacity(64);
    key.push_str(backend);
    let dims = [
        ("sw", p.src_w),
        ("sh", p.src_h),
        ("dw", p.dst_w),
        ("sx", p.src_x),
        ("sy", p.src_y),
        ("dx", p.dst_x),
        ("dy", p.dst_y),
        ("w", p.width),
        ("h", p.height),
    ];
    for (tag, dim) in dims {
        if let Some(value) = dim {
            key.push(':');
            key.push_str(tag);
            key.push_str(&value.to_string());
        }
    }
    if p.flags.unroll {
        key.push_str(":unroll");
    }
    if p.flags.inline_constants {
        key.push_str(":inline");
    }
    if p.flags.align_opt {
        key.push_str(":align");
    }
    key
}

/// Cumulative lookup counters for one back-end's cache.
///
/// Misses count compilations attempted: across any number of identical
/// calls a fingerprint compiles exactly once, so a well-behaved workload
/// shows `misses` equal to its number of distinct shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

type Latch = Arc<Mutex<Option<Arc<CompiledBlit>>>>;

/// Fingerprint → artifact map with a compile-once latch per entry.
///
/// Lookups take the map lock only long enough to clone the entry latch;
/// compilation runs under the latch alone, so concurrent first callers of
/// the same fingerprint share one in-flight compilation while other
/// fingerprints proceed. A failed compilation leaves its latch empty and
/// nothing cached.
#[derive(Default)]
pub(crate) struct SpecializationCache {
    entries: Mutex<HashMap<String, Latch>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SpecializationCache {
    pub fn get_or_compile(
        &self,
        key: &str,
        compile: impl FnOnce() -> Result<CompiledBlit>,
    ) -> Result<Arc<CompiledBlit>> {
        let latch = {
            let mut entries = self.entries.lock().unwrap();
            entries.entry(key.to_string()).or_default().clone()
        };
        let mut slot = latch.lock().unwrap();
        if let Some(artifact) = &*slot {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::trace!("cache hit for {key}");
            return Ok(artifact.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        log::debug!("cache miss for {key}, compiling");
        let artifact = Arc::new(compile()?);
        *slot = Some(artifact.clone());
        Ok(artifact)
    }

    /// Drops every artifact. Counters keep accumulating.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Replaces the artifact stored under `key`.
    #[cfg(test)]
    pub fn insert(&self, key: &str, artifact: CompiledBlit) {
        let latch = {
            let mut entries = self.entries.lock().unwrap();
            entries.entry(key.to_string()).or_default().clone()
        };
        *latch.lock().unwrap() = Some(Arc::new(artifact));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{BlitOp, CompileParams, CompilerFlags};

    fn sample() -> CompileParams {
        CompileParams::freeze_all(
            &BlitOp {
                src_w: 8,
                src_h: 8,
                src_x: 2,
                src_y: 2,
                dst_w: 4,
                dst_x: 0,
                dst_y: 0,
                width: 4,
                height: 4,
            },
            CompilerFlags::default(),
        )
    }

    #[test]
    fn deterministic_and_canonical() {
        let p = sample();
        assert_eq!(fingerprint("binary", &p), fingerprint("binary", &p));
        assert_eq!(
            fingerprint("binary", &p),
            "binary:sw8:sh8:dw4:sx2:sy2:dx0:dy0:w4:h4"
        );
    }

    #[test]
    fn sensitive_to_dimensions_flags_and_backend() {
        let p = sample();
        let mut q = p;
        q.width = Some(5);
        assert_ne!(fingerprint("binary", &p), fingerprint("binary", &q));

        let mut r = p;
        r.flags.unroll = true;
        assert_ne!(fingerprint("binary", &p), fingerprint("binary", &r));

        assert_ne!(fingerprint("binary", &p), fingerprint("textual", &p));
    }

    #[test]
    fn unfrozen_dimensions_are_omitted() {
        let mut p = sample();
        p.src_y = None;
        p.height = None;
        assert_eq!(fingerprint("textual", &p), "textual:sw8:sh8:dw4:sx2:dx0:dy0:w4");

        let mut q = p;
        q.flags.inline_constants = true;
        q.flags.align_opt = true;
        assert_eq!(
            fingerprint("textual", &q),
            "textual:sw8:sh8:dw4:sx2:dx0:dy0:w4:inline:align"
        );
    }

    #[test]
    fn debug_flag_stays_out_of_the_key() {
        let p = sample();
        let mut q = p;
        q.flags.debug = true;
        assert_eq!(fingerprint("binary", &p), fingerprint("binary", &q));
    }
}
