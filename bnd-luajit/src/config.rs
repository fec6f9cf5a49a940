//! Configuration types for `bnd-luajit.toml`.
//!
//! Every field has a default, so a run needs nothing but a header path.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::model::Direction;

/// Root configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    /// Additional directories injected as `-I` flags for clang.
    pub include_paths: Vec<PathBuf>,
    /// Extra clang arguments (e.g. `-DIMGUI_DISABLE_OBSOLETE_FUNCTIONS`).
    pub clang_args: Vec<String>,
    pub symbols: SymbolConfig,
    pub skip: SkipConfig,
    pub params: ParamConfig,
    /// Emit every enum of the header, not only those the bindings reference.
    pub emit_unreferenced_enums: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: OutputConfig::default(),
            include_paths: Vec::new(),
            clang_args: vec!["-x".into(), "c++".into(), "-std=c++17".into()],
            symbols: SymbolConfig::default(),
            skip: SkipConfig::default(),
            params: ParamConfig::default(),
            emit_unreferenced_enums: true,
        }
    }
}

/// Output file settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Module name; artifacts are `<name>_gen.h`, `<name>_gen.lua` and
    /// `<name>_host.cpp`. Defaults to the header's file stem.
    pub name: Option<String>,
    /// Output directory.
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            name: None,
            dir: PathBuf::from("generated"),
        }
    }
}

/// Naming of emitted symbols.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SymbolConfig {
    /// Prefix of every flat symbol. Defaults to `<module>_`.
    pub prefix: Option<String>,
    /// Stripped from enum constants when re-exporting them on the module
    /// table (`ImGuiWindowFlags_NoTitleBar` → `WindowFlags_NoTitleBar`).
    pub enum_strip_prefix: Option<String>,
    /// Suffix of the `va_list` variant a variadic function forwards to.
    pub variadic_suffix: String,
    /// Header the host shim includes. Defaults to the input header.
    pub shim_include: Option<String>,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            enum_strip_prefix: None,
            variadic_suffix: "V".into(),
            shim_include: None,
        }
    }
}

/// Declarations to leave out of every artifact.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SkipConfig {
    /// Source names (flat names for methods, e.g. `ImDrawList_AddText`).
    pub names: Vec<String>,
    /// clang USRs, for skipping a single overload.
    pub usrs: Vec<String>,
}

impl SkipConfig {
    pub fn matches(&self, flat_name: &str, usr: Option<&str>) -> bool {
        self.names.iter().any(|n| n == flat_name)
            || usr.is_some_and(|u| self.usrs.iter().any(|s| s == u))
    }
}

/// Output-parameter detection.
///
/// ```toml
/// [params]
/// out_prefixes = ["out_", "p_out"]
///
/// [params.directions]
/// "GetCursorPos.x" = "out"
/// ```
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ParamConfig {
    /// Explicit verdicts keyed by `Function.param` (flat function name).
    pub directions: BTreeMap<String, Direction>,
    /// Parameter-name prefixes marking an output parameter.
    pub out_prefixes: Vec<String>,
    /// Honor `@param[out]` / `\param[in,out]` in doc comments.
    pub doc_comments: bool,
}

impl Default for ParamConfig {
    fn default() -> Self {
        Self {
            directions: BTreeMap::new(),
            out_prefixes: vec!["out_".into()],
            doc_comments: true,
        }
    }
}

impl Config {
    /// Module name: configured, or the header's file stem.
    pub fn module_name(&self, header: &Path) -> String {
        self.output.name.clone().unwrap_or_else(|| {
            header
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "bindings".into())
        })
    }

    /// Flat symbol prefix: configured, or `<module>_`.
    pub fn symbol_prefix(&self, module: &str) -> String {
        self.symbols
            .prefix
            .clone()
            .unwrap_or_else(|| format!("{module}_"))
    }

    /// Full clang argument list: configured args plus `-I` per include path.
    pub fn clang_arguments(&self) -> Vec<String> {
        let mut args = self.clang_args.clone();
        for inc in &self.include_paths {
            args.push(format!("-I{}", inc.display()));
        }
        args
    }
}

/// Load and parse a `bnd-luajit.toml` configuration file.
///
/// Relative `include_paths` are resolved against the file's directory.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let mut config: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {}", path.display(), e))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    for inc in &mut config.include_paths {
        if inc.is_relative() {
            *inc = base_dir.join(&*inc);
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.output.dir, PathBuf::from("generated"));
        assert_eq!(cfg.symbols.variadic_suffix, "V");
        assert_eq!(cfg.params.out_prefixes, ["out_"]);
        assert!(cfg.params.doc_comments);
        assert!(cfg.emit_unreferenced_enums);
        assert_eq!(cfg.clang_args, ["-x", "c++", "-std=c++17"]);
        assert_eq!(cfg.module_name(Path::new("include/imgui.h")), "imgui");
        assert_eq!(cfg.symbol_prefix("imgui"), "imgui_");
    }

    #[test]
    fn sections_parse() {
        let cfg: Config = toml::from_str(
            r#"
            include_paths = ["inc"]
            emit_unreferenced_enums = false

            [output]
            name = "gui"

            [symbols]
            prefix = "ig"
            enum_strip_prefix = "ImGui"

            [skip]
            names = ["Render"]
            usrs = ["c:@F@Foo#I#"]

            [params]
            out_prefixes = []
            doc_comments = false

            [params.directions]
            "GetPos.x" = "out"
            "Slider.v" = "inout"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.module_name(Path::new("x.h")), "gui");
        assert_eq!(cfg.symbol_prefix("gui"), "ig");
        assert_eq!(cfg.params.directions["GetPos.x"], Direction::Out);
        assert_eq!(cfg.params.directions["Slider.v"], Direction::InOut);
        assert!(cfg.skip.matches("Render", None));
        assert!(cfg.skip.matches("Foo", Some("c:@F@Foo#I#")));
        assert!(!cfg.skip.matches("Foo", Some("c:@F@Foo#f#")));
        assert_eq!(cfg.clang_arguments().last().map(String::as_str), Some("-Iinc"));
    }

    #[test]
    fn unknown_direction_is_an_error() {
        let err = toml::from_str::<Config>(
            r#"
            [params.directions]
            "F.x" = "sideways"
            "#,
        );
        assert!(err.is_err());
    }
}
