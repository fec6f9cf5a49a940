//! Emitters: bindings → the three generated artifacts.
//!
//! * [`cdef`]: flat C interface for `ffi.cdef`
//! * [`lua`]: idiomatic Lua wrapper over the raw interface
//! * [`shim`]: C++ source exporting the flat symbols
//!
//! All three are pure functions of the [`BindingSet`]; nothing here reads
//! hash-ordered state, so output is stable across runs.

use tracing::debug;

use crate::bind::BindingSet;
use crate::config::Config;
use crate::diag::Diagnostic;

pub mod cdef;
pub mod layout;
pub mod lua;
pub mod luaify;
pub mod shim;

/// Names and options shared by every emitter.
#[derive(Debug, Clone, Copy)]
pub struct EmitContext<'a> {
    pub config: &'a Config,
    /// Module name, e.g. `imgui`.
    pub module: &'a str,
    /// Flat symbol prefix, e.g. `imgui_`.
    pub prefix: &'a str,
    /// What the host shim `#include`s.
    pub include: &'a str,
}

/// Generated sources, in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// `<module>_gen.h`
    pub interface: String,
    /// `<module>_gen.lua`
    pub wrapper: String,
    /// `<module>_host.cpp`
    pub host: String,
}

/// Emit all three artifacts. Also returns diagnostics for wrapper names
/// that could not be claimed.
pub fn emit_all(set: &BindingSet<'_>, ctx: &EmitContext<'_>) -> (Artifacts, Vec<Diagnostic>) {
    let layout = layout::build(set, ctx.config.emit_unreferenced_enums);
    debug!(
        enums = layout.enums.len(),
        vectors = layout.vectors.len(),
        records = layout.records.len(),
        bindings = set.bindings.len(),
        "computed layout"
    );
    let (wrapper, collisions) = lua::emit(set, &layout, ctx);
    let artifacts = Artifacts {
        interface: cdef::emit(set, &layout, ctx),
        wrapper,
        host: shim::emit(set, ctx),
    };
    (artifacts, collisions)
}

/// First line of every artifact.
pub(crate) fn banner(comment: &str) -> String {
    format!("{comment} Generated by bnd-luajit. DO NOT EDIT.\n")
}
