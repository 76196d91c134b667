//! Engine configuration.
//!
//! Configuration hangs off the [`crate::Engine`] handle rather than living
//! in process-global state; a [`CallOptions`] record can override any field
//! for a single call. Dispatch snapshots the effective configuration once
//! per call, so an in-flight operation never observes a torn mix.

use crate::backend::BackendKind;
use crate::params::CompilerFlags;

/// Engine-wide settings, with wasmtime-style chaining setters.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) verify: bool,
    pub(crate) use_specialized: bool,
    pub(crate) analyze: bool,
    pub(crate) autospecialize: bool,
    pub(crate) back_end: BackendKind,
    pub(crate) log_perf: bool,
    pub(crate) compiler: CompilerFlags,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verify: false,
            use_specialized: true,
            analyze: true,
            autospecialize: true,
            back_end: BackendKind::Textual,
            log_perf: false,
            compiler: CompilerFlags::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shadow every specialized call with the reference and compare.
    pub fn verify(&mut self, enable: bool) -> &mut Self {
        self.verify = enable;
        self
    }

    /// When disabled, every call runs the reference directly.
    pub fn use_specialized(&mut self, enable: bool) -> &mut Self {
        self.use_specialized = enable;
        self
    }

    /// Run the operation analyzer before dispatch.
    pub fn analyze(&mut self, enable: bool) -> &mut Self {
        self.analyze = enable;
        self
    }

    /// Let analyzer findings feed the compiler flags (and thus the
    /// fingerprint).
    pub fn autospecialize(&mut self, enable: bool) -> &mut Self {
        self.autospecialize = enable;
        self
    }

    pub fn back_end(&mut self, kind: BackendKind) -> &mut Self {
        self.back_end = kind;
        self
    }

    /// Emit one log line per call with back-end, fingerprint and timing.
    pub fn log_perf(&mut self, enable: bool) -> &mut Self {
        self.log_perf = enable;
        self
    }

    pub fn unroll(&mut self, enable: bool) -> &mut Self {
        self.compiler.unroll = enable;
        self
    }

    pub fn inline_constants(&mut self, enable: bool) -> &mut Self {
        self.compiler.inline_constants = enable;
        self
    }

    pub fn align_opt(&mut self, enable: bool) -> &mut Self {
        self.compiler.align_opt = enable;
        self
    }

    /// Log generated source and disassembly.
    pub fn debug_output(&mut self, enable: bool) -> &mut Self {
        self.compiler.debug = enable;
        self
    }
}

/// Per-call overrides; unset fields fall through to the engine's
/// [`Config`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    verify: Option<bool>,
    use_specialized: Option<bool>,
    analyze: Option<bool>,
    autospecialize: Option<bool>,
    back_end: Option<BackendKind>,
    log_perf: Option<bool>,
    unroll: Option<bool>,
    inline_constants: Option<bool>,
    align_opt: Option<bool>,
    debug: Option<bool>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verify(mut self, enable: bool) -> Self {
        self.verify = Some(enable);
        self
    }

    pub fn use_specialized(mut self, enable: bool) -> Self {
        self.use_specialized = Some(enable);
        self
    }

    pub fn analyze(mut self, enable: bool) -> Self {
        self.analyze = Some(enable);
        self
    }

    pub fn autospecialize(mut self, enable: bool) -> Self {
        self.autospecialize = Some(enable);
        self
    }

    pub fn back_end(mut self, kind: BackendKind) -> Self {
        self.back_end = Some(kind);
        self
    }

    pub fn log_perf(mut self, enable: bool) -> Self {
        self.log_perf = Some(enable);
        self
    }

    pub fn unroll(mut self, enable: bool) -> Self {
        self.unroll = Some(enable);
        self
    }

    pub fn inline_constants(mut self, enable: bool) -> Self {
        self.inline_constants = Some(enable);
        self
    }

    pub fn align_opt(mut self, enable: bool) -> Self {
        self.align_opt = Some(enable);
        self
    }

    pub fn debug_output(mut self, enable: bool) -> Self {
        self.debug = Some(enable);
        self
    }

    /// The effective configuration for one call.
    pub(crate) fn apply(&self, base: &Config) -> Config {
        let mut config = base.clone();
        if let Some(v) = self.verify {
            config.verify = v;
        }
        if let Some(v) = self.use_specialized {
            config.use_specialized = v;
        }
        if let Some(v) = self.analyze {
            config.analyze = v;
        }
        if let Some(v) = self.autospecialize {
            config.autospecialize = v;
        }
        if let Some(v) = self.back_end {
            config.back_end = v;
        }
        if let Some(v) = self.log_perf {
            config.log_perf = v;
        }
        if let Some(v) = self.unroll {
            config.compiler.unroll = v;
        }
        if let Some(v) = self.inline_constants {
            config.compiler.inline_constants = v;
        }
        if let Some(v) = self.align_opt {
            config.compiler.align_opt = v;
        }
        if let Some(v) = self.debug {
            config.compiler.debug = v;
        }
        config
    }
}
