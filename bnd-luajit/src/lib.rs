//! bnd-luajit: C/C++ header → LuaJIT FFI binding generator.
//!
//! Parses a header via libclang and emits three artifacts:
//!
//! * `<module>_gen.h`: flat, overload-free declarations for `ffi.cdef`
//! * `<module>_gen.lua`: an ergonomic Lua wrapper over them
//! * `<module>_host.cpp`: C++ exports forwarding each flat symbol to the
//!   scoped native call
//!
//! # Quick start
//!
//! Generate into the configured output directory (suitable for `build.rs`):
//!
//! ```no_run
//! use std::path::Path;
//!
//! let cfg = bnd_luajit::config::Config::default();
//! bnd_luajit::run(Path::new("imgui.h"), &cfg, None).unwrap();
//! ```
//!
//! Or get the sources without writing to disk:
//!
//! ```no_run
//! use std::path::Path;
//!
//! let cfg = bnd_luajit::config::Config::default();
//! let generated = bnd_luajit::generate(Path::new("imgui.h"), &cfg).unwrap();
//! println!("{}", generated.artifacts.wrapper);
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

pub mod bind;
pub mod config;
pub mod diag;
pub mod direction;
pub mod emit;
pub mod extract;
pub mod model;
pub mod overload;
pub mod typemap;

#[cfg(test)]
mod fixtures;

/// Result of one generator run.
#[derive(Debug)]
pub struct Generated {
    /// Module name the artifacts are named after.
    pub module: String,
    pub artifacts: emit::Artifacts,
    /// Everything that was left out, and why.
    pub diagnostics: diag::Diagnostics,
}

/// Paths written by [`run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifacts {
    pub interface: PathBuf,
    pub wrapper: PathBuf,
    pub host: PathBuf,
}

/// Run the full pipeline: parse the header, generate, and write the three
/// artifacts.
///
/// `out_dir` overrides `cfg.output.dir`. Nothing is written unless
/// generation succeeds.
pub fn run(header: &Path, cfg: &config::Config, out_dir: Option<&Path>) -> Result<WrittenArtifacts> {
    let generated = generate(header, cfg)?;

    let dir = out_dir.unwrap_or(cfg.output.dir.as_path());
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;

    let written = WrittenArtifacts {
        interface: dir.join(format!("{}_gen.h", generated.module)),
        wrapper: dir.join(format!("{}_gen.lua", generated.module)),
        host: dir.join(format!("{}_host.cpp", generated.module)),
    };
    for (path, text) in [
        (&written.interface, &generated.artifacts.interface),
        (&written.wrapper, &generated.artifacts.wrapper),
        (&written.host, &generated.artifacts.host),
    ] {
        std::fs::write(path, text).with_context(|| format!("writing output to {}", path.display()))?;
        info!(path = %path.display(), size = text.len(), "wrote artifact");
    }

    if !generated.diagnostics.is_empty() {
        warn!("{}", generated.diagnostics.summary());
    }
    Ok(written)
}

/// Parse `header` with libclang and generate the artifacts in memory.
///
/// libclang is initialized here and released before returning.
pub fn generate(header: &Path, cfg: &config::Config) -> Result<Generated> {
    if !header.is_file() {
        anyhow::bail!("header not found: {}", header.display());
    }
    let header = header
        .canonicalize()
        .with_context(|| format!("resolving {}", header.display()))?;

    let unit = {
        let clang = clang::Clang::new()
            .map_err(|e| anyhow::anyhow!("failed to initialize libclang: {e}"))?;
        let index = clang::Index::new(&clang, false, false);
        extract::extract_header(&index, &header, &cfg.clang_arguments())
            .with_context(|| format!("extracting {}", header.display()))?
    };

    generate_from_unit(&unit, cfg)
}

/// Generate the artifacts from an already-extracted translation unit.
pub fn generate_from_unit(unit: &model::TranslationUnit, cfg: &config::Config) -> Result<Generated> {
    let module = cfg.module_name(&unit.header);
    let prefix = cfg.symbol_prefix(&module);
    let include = match &cfg.symbols.shim_include {
        Some(include) => include.clone(),
        None => unit
            .header
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    info!(module = %module, prefix = %prefix, "loaded configuration");

    let set = bind::bind(unit, cfg, &prefix)?;
    let ctx = emit::EmitContext {
        config: cfg,
        module: &module,
        prefix: &prefix,
        include: &include,
    };
    let (artifacts, collisions) = emit::emit_all(&set, &ctx);
    let bindings = set.bindings.len();
    let mut diagnostics = set.diagnostics;
    diagnostics.extend(collisions);
    info!(
        bindings,
        diagnostics = diagnostics.len(),
        "generated bindings"
    );

    Ok(Generated {
        module,
        artifacts,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_generation_names_artifacts_after_the_header() {
        let unit = fixtures::widgets_unit();
        let generated = generate_from_unit(&unit, &config::Config::default()).unwrap();
        assert_eq!(generated.module, "widgets");
        assert!(generated.artifacts.interface.contains("widgets_Foo2("));
        assert!(generated.artifacts.host.contains("#include \"widgets.h\""));
        assert!(generated.artifacts.wrapper.contains("function M.Foo3("));
    }

    #[test]
    fn rejected_declarations_are_reported_not_fatal() {
        let unit = fixtures::widgets_unit();
        let generated = generate_from_unit(&unit, &config::Config::default()).unwrap();
        let subjects: Vec<&str> = generated
            .diagnostics
            .iter()
            .map(|d| d.subject.as_str())
            .collect();
        assert!(subjects.contains(&"Window"), "{subjects:?}");
        assert!(subjects.contains(&"PushItems"), "{subjects:?}");
        assert!(subjects.contains(&"LogAll"), "{subjects:?}");
    }

    #[test]
    fn wrapper_name_collisions_join_the_diagnostics() {
        let unit = fixtures::clashing_unit();
        let generated = generate_from_unit(&unit, &config::Config::default()).unwrap();
        let collisions: Vec<&str> = generated
            .diagnostics
            .iter()
            .filter(|d| matches!(d.kind, diag::DiagnosticKind::NameCollision { .. }))
            .map(|d| d.subject.as_str())
            .collect();
        assert_eq!(collisions, ["Float", "Separator"]);
        assert!(generated.diagnostics.summary().contains("Lua name `FloatPtr` is already used by `float`"));
    }

    #[test]
    fn missing_header_is_fatal() {
        let err = generate(Path::new("does/not/exist.h"), &config::Config::default()).unwrap_err();
        assert!(err.to_string().contains("header not found"), "{err}");
    }
}
