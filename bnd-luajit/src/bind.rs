//! Binding: join extracted functions with their type mappings, resolved
//! names and parameter directions.
//!
//! The output is the set of bindings every emitter renders. A function that
//! cannot be bound is left out with a diagnostic; nothing here aborts.

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::Config;
use crate::diag::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::direction::PolicyChain;
use crate::model::*;
use crate::overload::{self, OverloadTable};
use crate::typemap::{PassingStrategy, TypeMapper, TypeMapping, VectorShape};

/// Part a parameter plays in the wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    Plain,
    /// The synthetic `self` of a member function.
    Receiver,
    /// A writable `char*`; the parameter at `length` carries its capacity.
    Buffer { length: usize },
    /// Capacity of the buffer at `buffer`.
    BufferLength { buffer: usize },
}

#[derive(Debug, Clone)]
pub struct BoundParam {
    /// Identifier safe to use as a Lua local.
    pub name: String,
    /// Identifier used in the C interface and the host shim.
    pub native_name: String,
    pub mapping: TypeMapping,
    pub strategy: PassingStrategy,
    pub direction: Direction,
    /// Default argument as written in the header.
    pub default_value: Option<String>,
    /// Header spelling of the native type, when extraction recorded one.
    pub native_spelling: Option<String>,
    pub role: ParamRole,
}

impl BoundParam {
    pub fn is_receiver(&self) -> bool {
        self.role == ParamRole::Receiver
    }

    /// Vector shape the wrapper converts with `:ptr()`.
    pub fn array_vector(&self) -> Option<&VectorShape> {
        match self.strategy {
            PassingStrategy::FixedArray => self.mapping.vector.as_ref(),
            _ => None,
        }
    }
}

/// One function that made it into the artifacts.
#[derive(Debug)]
pub struct EmittedBinding<'a> {
    /// Overload-resolved name, e.g. `Button2`.
    pub emitted_name: String,
    /// Flat C symbol, `<prefix><emitted_name>`.
    pub symbol: String,
    pub decl: &'a Declaration,
    pub func: &'a FunctionDecl,
    pub params: Vec<BoundParam>,
    pub ret: TypeMapping,
}

impl EmittedBinding<'_> {
    /// All foreign types the binding's C prototype mentions.
    pub fn foreign_types(&self) -> impl Iterator<Item = &CType> {
        std::iter::once(&self.ret.foreign).chain(self.params.iter().map(|p| &p.mapping.foreign))
    }

    /// All mappings the binding uses, return type first.
    pub fn mappings(&self) -> impl Iterator<Item = &TypeMapping> {
        std::iter::once(&self.ret).chain(self.params.iter().map(|p| &p.mapping))
    }
}

/// Everything the emitters need.
pub struct BindingSet<'a> {
    pub unit: &'a TranslationUnit,
    pub mapper: TypeMapper<'a>,
    pub overloads: OverloadTable,
    pub bindings: Vec<EmittedBinding<'a>>,
    /// Extraction diagnostics followed by binding diagnostics.
    pub diagnostics: Diagnostics,
}

const LUA_RESERVED: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
    // Upvalues of the generated module.
    "ffi", "bit", "C", "M",
];

/// A parameter name usable as a Lua local: `end` → `_end`, `""` → `arg<i>`.
pub fn lua_identifier(name: &str, index: usize) -> String {
    if name.is_empty() {
        format!("arg{index}")
    } else if LUA_RESERVED.contains(&name) {
        format!("_{name}")
    } else {
        name.to_string()
    }
}

/// Bind every function of `unit`.
pub fn bind<'a>(unit: &'a TranslationUnit, cfg: &Config, prefix: &str) -> Result<BindingSet<'a>> {
    let mut diagnostics = Diagnostics::default();
    diagnostics.extend(unit.diagnostics.iter().cloned());
    let overloads = overload::resolve(unit, &mut diagnostics)?;
    let mut mapper = TypeMapper::new(unit);
    let policies = PolicyChain::from_config(&cfg.params);

    let mut bindings = Vec::new();
    for (idx, decl, func) in unit.functions() {
        let flat = decl.flat_name();
        if cfg.skip.matches(&flat, func.usr.as_deref()) {
            debug!(name = %flat, "skipped by configuration");
            continue;
        }
        let Some(emitted_name) = overloads.emitted_name(idx) else {
            continue;
        };
        match bind_function(decl, func, &mut mapper, &policies) {
            Ok((params, ret)) => {
                debug!(
                    name = %flat,
                    emitted = %emitted_name,
                    params = params.len(),
                    "bound function"
                );
                bindings.push(EmittedBinding {
                    emitted_name: emitted_name.to_string(),
                    symbol: format!("{prefix}{emitted_name}"),
                    decl,
                    func,
                    params,
                    ret,
                });
            }
            Err(kind) => {
                let diag = Diagnostic::new(flat, Some(decl.location.clone()), kind);
                warn!("{diag}");
                diagnostics.push(diag);
            }
        }
    }

    Ok(BindingSet {
        unit,
        mapper,
        overloads,
        bindings,
        diagnostics,
    })
}

fn bind_function(
    decl: &Declaration,
    func: &FunctionDecl,
    mapper: &mut TypeMapper<'_>,
    policies: &PolicyChain,
) -> Result<(Vec<BoundParam>, TypeMapping), DiagnosticKind> {
    if func.is_variadic && func.params.is_empty() {
        return Err(DiagnosticKind::UnsupportedVariadic);
    }

    let unsupported = |position: String| {
        move |e: crate::typemap::Unsupported| DiagnosticKind::UnsupportedType {
            ty: e.ty,
            position,
            reason: e.reason,
        }
    };

    let ret_id = mapper
        .map(&func.return_type)
        .map_err(unsupported("return type".into()))?;
    let ret = mapper.get(ret_id).clone();

    let mut params = Vec::with_capacity(func.params.len() + 1);
    if let Some(method) = func.method.as_ref().filter(|m| !m.is_static) {
        let record = CType::record(&method.record);
        let ty = if method.is_const {
            CType::const_ptr(record)
        } else {
            CType::ptr(record)
        };
        let id = mapper.map(&ty).map_err(unsupported("receiver".into()))?;
        let mapping = mapper.get(id).clone();
        params.push(BoundParam {
            name: "self".into(),
            native_name: "self".into(),
            strategy: mapping.strategy,
            mapping,
            direction: Direction::In,
            default_value: None,
            native_spelling: None,
            role: ParamRole::Receiver,
        });
    }

    let offset = params.len();
    for (i, param) in func.params.iter().enumerate() {
        let id = mapper
            .map(&param.ty)
            .map_err(unsupported(format!("parameter `{}`", param.name)))?;
        let mapping = mapper.get(id).clone();
        let direction = policies
            .resolve(decl, param, mapping.is_writable())
            .map_err(|reason| DiagnosticKind::AmbiguousDirection {
                param: param.name.clone(),
                reason,
            })?;
        let native_name = if param.name.is_empty() {
            format!("arg{i}")
        } else {
            param.name.clone()
        };
        params.push(BoundParam {
            name: lua_identifier(&param.name, i),
            native_name,
            strategy: mapping.strategy,
            mapping,
            direction,
            default_value: param.default_value.clone(),
            native_spelling: param.native_spelling.clone(),
            role: ParamRole::Plain,
        });
    }

    link_string_buffers(&func.params, &mut params[offset..], offset);
    Ok((params, ret))
}

/// A writable `char*` directly followed by an integer becomes a string
/// buffer with that integer as its capacity.
fn link_string_buffers(native: &[Parameter], bound: &mut [BoundParam], offset: usize) {
    let mut i = 0;
    while i + 1 < native.len() {
        let is_buffer = matches!(
            native[i].ty.canonical(),
            CType::Ptr { pointee, is_const: false } if **pointee == CType::Char
        );
        if is_buffer && native[i + 1].ty.is_integer() {
            bound[i].strategy = PassingStrategy::StringBuffer;
            bound[i].role = ParamRole::Buffer {
                length: offset + i + 1,
            };
            bound[i + 1].role = ParamRole::BufferLength { buffer: offset + i };
            i += 2;
        } else {
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn bound(set: &BindingSet<'_>, emitted: &str) -> usize {
        set.bindings
            .iter()
            .position(|b| b.emitted_name == emitted)
            .unwrap_or_else(|| panic!("no binding `{emitted}`"))
    }

    #[test]
    fn keywords_and_unnamed_parameters() {
        assert_eq!(lua_identifier("end", 0), "_end");
        assert_eq!(lua_identifier("M", 0), "_M");
        assert_eq!(lua_identifier("", 2), "arg2");
        assert_eq!(lua_identifier("label", 0), "label");
    }

    #[test]
    fn overloads_get_ordinal_symbols() {
        let unit = fixtures::widgets_unit();
        let set = bind(&unit, &Config::default(), "w_").unwrap();
        let names: Vec<&str> = set
            .bindings
            .iter()
            .filter(|b| b.decl.source_name == "Foo")
            .map(|b| b.symbol.as_str())
            .collect();
        assert_eq!(names, ["w_Foo", "w_Foo2", "w_Foo3"]);
    }

    #[test]
    fn methods_get_a_receiver() {
        let unit = fixtures::widgets_unit();
        let set = bind(&unit, &Config::default(), "w_").unwrap();
        let b = &set.bindings[bound(&set, "Style_ScaleAll")];
        assert!(b.params[0].is_receiver());
        assert_eq!(b.params[0].mapping.foreign.declare("self"), "Style *self");
        assert_eq!(b.params[1].name, "factor");
    }

    #[test]
    fn string_buffer_is_linked_to_its_length() {
        let unit = fixtures::widgets_unit();
        let set = bind(&unit, &Config::default(), "w_").unwrap();
        let b = &set.bindings[bound(&set, "InputText")];
        assert_eq!(b.params[1].strategy, PassingStrategy::StringBuffer);
        assert_eq!(b.params[1].role, ParamRole::Buffer { length: 2 });
        assert_eq!(b.params[2].role, ParamRole::BufferLength { buffer: 1 });
    }

    #[test]
    fn unsupported_parameter_excludes_the_function() {
        let unit = fixtures::widgets_unit();
        let set = bind(&unit, &Config::default(), "w_").unwrap();
        assert!(set.bindings.iter().all(|b| b.emitted_name != "PushItems"));
        let d = set.diagnostics.about("PushItems").next().unwrap();
        assert!(matches!(d.kind, DiagnosticKind::UnsupportedType { .. }));
        // Extraction diagnostics are carried over.
        assert!(set.diagnostics.about("Window").next().is_some());
    }

    #[test]
    fn skip_list_removes_without_diagnostic() {
        let unit = fixtures::widgets_unit();
        let mut cfg = Config::default();
        cfg.skip.names.push("Separator".into());
        let set = bind(&unit, &cfg, "w_").unwrap();
        assert!(set.bindings.iter().all(|b| b.emitted_name != "Separator"));
        assert!(set.diagnostics.about("Separator").next().is_none());
    }

    #[test]
    fn variadic_without_named_parameter_is_excluded() {
        let unit = fixtures::widgets_unit();
        let set = bind(&unit, &Config::default(), "w_").unwrap();
        assert!(set.bindings.iter().any(|b| b.emitted_name == "Text"));
        let d = set.diagnostics.about("LogAll").next().unwrap();
        assert_eq!(d.kind, DiagnosticKind::UnsupportedVariadic);
    }

    #[test]
    fn out_prefix_sets_direction() {
        let unit = fixtures::widgets_unit();
        let set = bind(&unit, &Config::default(), "w_").unwrap();
        let b = &set.bindings[bound(&set, "GetCursor")];
        assert_eq!(b.params[0].direction, Direction::Out);
        assert_eq!(b.params[0].strategy, PassingStrategy::Pointer);
    }
}
