//! Lua wrapper over the raw interface.
//!
//! The module returned by the generated file exposes one function per
//! binding plus helper types: vector value types, boxes for pointer
//! parameters and `CString` for string buffers. `M.init(lib)` binds it to a
//! loaded library.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use tracing::{debug, warn};

use crate::bind::{BindingSet, BoundParam, EmittedBinding, ParamRole, lua_identifier};
use crate::diag::{Diagnostic, DiagnosticKind};
use crate::emit::layout::{Layout, RecordShape};
use crate::emit::luaify::{self, DefaultScope};
use crate::emit::{EmitContext, banner};
use crate::model::{CType, SourceLocation};
use crate::typemap::{PassingStrategy, VectorBacking, VectorShape};

const RULE: &str =
    "--------------------------------------------------------------------------------\n";

pub fn emit(
    set: &BindingSet<'_>,
    layout: &Layout<'_>,
    ctx: &EmitContext<'_>,
) -> (String, Vec<Diagnostic>) {
    let names = LuaNames::plan(set, layout, ctx);

    let mut out = banner("--");
    let _ = writeln!(
        out,
        "-- Lua bindings for `{}`. Call M.init(lib [, cdef]) once before use.\n",
        ctx.module
    );
    out.push_str("local ffi = require(\"ffi\")\n");
    out.push_str("local bit = require(\"bit\")\n");
    out.push_str("local C -- bound library, set by M.init\n\n");
    out.push_str("local M = {}\n\n");

    if !layout.vectors.is_empty() {
        section(&mut out, "Value types");
        for shape in &layout.vectors {
            out.push_str(&vector_type(shape));
            out.push('\n');
        }
    }

    if !names.records.is_empty() {
        section(&mut out, "Struct constructors");
        for record in &names.records {
            out.push_str(&record_constructor(record));
            out.push('\n');
        }
    }

    if !names.boxes.is_empty() {
        section(&mut out, "Boxes for pointer parameters");
        for (name, pointee) in &names.boxes {
            let _ = writeln!(
                out,
                "function M.{name}(v)\n  local box = ffi.new(\"{}[1]\")\n  if v ~= nil then box[0] = v end\n  return box\nend\n",
                pointee.spelling()
            );
        }
    }

    section(&mut out, "String buffers");
    out.push_str(CSTRING);
    out.push('\n');

    let scope = names.default_scope(layout);
    section(&mut out, "Functions");
    for binding in set.bindings.iter().filter(|b| names.functions.contains(&b.emitted_name)) {
        out.push_str(&function(binding, &scope));
    }
    out.push('\n');

    section(&mut out, "Initialization");
    out.push_str("function M.init(lib, cdef)\n");
    out.push_str("  if cdef then ffi.cdef(cdef) end\n");
    out.push_str("  C = lib\n");
    for shape in &layout.vectors {
        let name = &shape.type_name;
        let _ = writeln!(
            out,
            "  if not {name}_t then {name}_t = ffi.metatype(\"{name}\", {name}_mt) end"
        );
    }
    for (decl, e) in &layout.enums {
        if e.variants.is_empty() {
            continue;
        }
        if decl.source_name.is_empty() {
            out.push_str("  -- anonymous enum\n");
        } else {
            let _ = writeln!(out, "  -- enum {}", decl.source_name);
        }
        for v in &e.variants {
            match names.exports.get(&v.name) {
                Some(export) => {
                    let _ = writeln!(out, "  M.{export} = C.{}", v.name);
                }
                None => {
                    let _ = writeln!(out, "  -- {} is reachable as C.{0}", v.name);
                }
            }
        }
    }
    out.push_str("  return M\nend\n\nreturn M\n");
    (out, names.diagnostics)
}

fn section(out: &mut String, title: &str) {
    out.push_str(RULE);
    let _ = writeln!(out, "-- {title}");
    out.push_str(RULE);
    out.push('\n');
}

/// Lua name an enum constant is re-exported under.
pub fn export_name<'n>(name: &'n str, strip: Option<&str>) -> &'n str {
    match strip.and_then(|p| name.strip_prefix(p)) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') => rest,
        _ => name,
    }
}

// ---------------------------------------------------------------------------
// Names on `M`
// ---------------------------------------------------------------------------

/// Every name the wrapper puts on `M`, decided before anything is written.
///
/// Claims are made in a fixed order: helper types, then functions, struct
/// constructors, boxes and finally enum constants. A later claim on a taken
/// name is dropped and reported.
struct LuaNames {
    /// Lua name → what claimed it.
    owners: HashMap<String, String>,
    functions: HashSet<String>,
    records: Vec<RecordShape>,
    boxes: Vec<(String, CType)>,
    /// Enum constant → exported name.
    exports: HashMap<String, String>,
    diagnostics: Vec<Diagnostic>,
}

impl LuaNames {
    fn plan(set: &BindingSet<'_>, layout: &Layout<'_>, ctx: &EmitContext<'_>) -> Self {
        let mut names = LuaNames {
            owners: HashMap::new(),
            functions: HashSet::new(),
            records: Vec::new(),
            boxes: Vec::new(),
            exports: HashMap::new(),
            diagnostics: Vec::new(),
        };
        for builtin in ["init", "CString"] {
            names.owners.insert(builtin.to_string(), format!("M.{builtin}"));
        }
        for shape in &layout.vectors {
            names
                .owners
                .insert(shape.type_name.clone(), shape.type_name.clone());
        }

        for binding in &set.bindings {
            let location = Some(binding.decl.location.clone());
            if names.claim(
                &[binding.emitted_name.as_str()],
                &binding.emitted_name,
                &binding.decl.qualified_name(),
                location,
            ) {
                names.functions.insert(binding.emitted_name.clone());
            }
        }

        for record in &layout.records {
            if layout.vectors.iter().any(|v| v.type_name == record.name) {
                continue;
            }
            let location = set
                .unit
                .declarations
                .iter()
                .find(|d| d.source_name == record.name)
                .map(|d| d.location.clone());
            let ptr = format!("{}Ptr", record.name);
            if names.claim(
                &[record.name.as_str(), ptr.as_str()],
                &record.name,
                &format!("struct {}", record.name),
                location,
            ) {
                names.records.push(record.clone());
            }
        }

        let mut seen: Vec<(String, CType)> = Vec::new();
        for candidate in box_candidates(set) {
            if seen.contains(&candidate) {
                continue;
            }
            seen.push(candidate.clone());
            let (name, pointee) = candidate;
            let spelling = pointee.spelling();
            if names.claim(&[name.as_str()], &spelling, &spelling, None) {
                names.boxes.push((name, pointee));
            }
        }

        let strip = ctx.config.symbols.enum_strip_prefix.as_deref();
        for (decl, e) in &layout.enums {
            for v in &e.variants {
                let export = export_name(&v.name, strip);
                if names.claim(&[export], &v.name, &v.name, Some(decl.location.clone())) {
                    names.exports.insert(v.name.clone(), export.to_string());
                }
            }
        }

        for d in &names.diagnostics {
            warn!("{d}");
        }
        names
    }

    /// Claim all of `wanted` for `owner`, or none of them. A refused claim
    /// is reported against `subject`.
    fn claim(
        &mut self,
        wanted: &[&str],
        subject: &str,
        owner: &str,
        location: Option<SourceLocation>,
    ) -> bool {
        if let Some((name, taken)) = wanted
            .iter()
            .find_map(|n| self.owners.get(*n).map(|taken| (*n, taken)))
        {
            self.diagnostics.push(Diagnostic::new(
                subject,
                location,
                DiagnosticKind::NameCollision {
                    name: name.to_string(),
                    owner: taken.clone(),
                },
            ));
            return false;
        }
        for name in wanted {
            self.owners.insert(name.to_string(), owner.to_string());
        }
        true
    }

    /// Default-argument scope: exported constants read from `M`, dropped
    /// ones straight from the library.
    fn default_scope(&self, layout: &Layout<'_>) -> DefaultScope {
        let mut constants = HashMap::new();
        for (_, e) in &layout.enums {
            for v in &e.variants {
                let expr = match self.exports.get(&v.name) {
                    Some(export) => format!("M.{export}"),
                    None => format!("C.{}", v.name),
                };
                constants.insert(v.name.clone(), expr);
            }
        }
        DefaultScope {
            constants,
            constructors: layout.vectors.iter().map(|v| v.type_name.clone()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Struct constructors
// ---------------------------------------------------------------------------

/// `M.<T>(fields...)` fills the named fields it is given; `M.<T>Ptr()`
/// allocates a one-element array to pass where a `T*` is written through.
fn record_constructor(record: &RecordShape) -> String {
    let name = &record.name;
    let params: Vec<String> = record
        .fields
        .iter()
        .enumerate()
        .map(|(i, f)| match lua_identifier(f, i) {
            // `res` is the constructor's own local.
            p if p == "res" => "_res".to_string(),
            p => p,
        })
        .collect();
    let mut out = format!("function M.{name}({})\n", params.join(", "));
    let _ = writeln!(out, "  local res = ffi.new(\"{name}\")");
    for (field, param) in record.fields.iter().zip(&params) {
        let target = if field == param {
            format!("res.{field}")
        } else {
            format!("res[\"{field}\"]")
        };
        let _ = writeln!(out, "  if {param} ~= nil then {target} = {param} end");
    }
    out.push_str("  return res\nend\n");
    let _ = writeln!(
        out,
        "function M.{name}Ptr() return ffi.new(\"{name}[1]\") end"
    );
    out
}

// ---------------------------------------------------------------------------
// Vector value types
// ---------------------------------------------------------------------------

fn vector_type(shape: &VectorShape) -> String {
    let name = &shape.type_name;
    let n = shape.arity();
    let get = |var: &str, i: usize| match shape.backing {
        VectorBacking::Struct => format!("{var}.{}", shape.components[i]),
        VectorBacking::Array => format!("{var}.v[{i}]"),
    };
    let make = |parts: Vec<String>| match shape.backing {
        VectorBacking::Struct => format!("{name}_t({})", parts.join(", ")),
        VectorBacking::Array => format!("{name}_t({{ v = {{ {} }} }})", parts.join(", ")),
    };
    let zip = |f: &dyn Fn(usize) -> String| make((0..n).map(f).collect());

    let mut out = String::new();
    let _ = writeln!(out, "local {name}_t -- ctype, set by M.init");
    let _ = writeln!(out, "local {name}_mt = {{}}");
    let _ = writeln!(out, "{name}_mt.__index = {name}_mt");
    let _ = writeln!(
        out,
        "function {name}_mt.__add(a, b) return {} end",
        zip(&|i| format!("{} + {}", get("a", i), get("b", i)))
    );
    let _ = writeln!(
        out,
        "function {name}_mt.__sub(a, b) return {} end",
        zip(&|i| format!("{} - {}", get("a", i), get("b", i)))
    );
    let _ = writeln!(out, "function {name}_mt.__mul(a, b)");
    let _ = writeln!(
        out,
        "  if type(a) == \"number\" then return {} end",
        zip(&|i| format!("a * {}", get("b", i)))
    );
    let _ = writeln!(out, "  return {}", zip(&|i| format!("{} * b", get("a", i))));
    out.push_str("end\n");
    let _ = writeln!(
        out,
        "function {name}_mt.__unm(a) return {} end",
        zip(&|i| format!("-{}", get("a", i)))
    );
    let eq: Vec<String> = (0..n)
        .map(|i| format!("{} == {}", get("a", i), get("b", i)))
        .collect();
    let _ = writeln!(
        out,
        "function {name}_mt.__eq(a, b)\n  return ffi.istype({name}_t, a) and ffi.istype({name}_t, b) and {}\nend",
        eq.join(" and ")
    );
    let fmt = vec!["%g"; n].join(", ");
    let args: Vec<String> = (0..n).map(|i| get("a", i)).collect();
    let _ = writeln!(
        out,
        "function {name}_mt.__tostring(a) return string.format(\"{name}({fmt})\", {}) end",
        args.join(", ")
    );
    match shape.backing {
        VectorBacking::Struct => {
            let _ = writeln!(
                out,
                "function {name}_mt:ptr() return ffi.cast(\"{} *\", self) end",
                shape.element.spelling()
            );
        }
        VectorBacking::Array => {
            let _ = writeln!(out, "function {name}_mt:ptr() return self.v end");
        }
    }
    let params: Vec<&str> = shape.components.iter().map(String::as_str).collect();
    let _ = writeln!(
        out,
        "function M.{name}({}) return {} end",
        params.join(", "),
        make(params.iter().map(|c| format!("{c} or 0")).collect())
    );
    out
}

// ---------------------------------------------------------------------------
// Boxes
// ---------------------------------------------------------------------------

/// Box constructor name for a pointer to `pointee`, if it is a scalar.
pub fn box_name(pointee: &CType) -> Option<String> {
    let name = match pointee {
        CType::Bool => "Bool",
        CType::Char => "Char",
        CType::I8 => "Int8",
        CType::U8 => "Uint8",
        CType::I16 => "Int16",
        CType::U16 => "Uint16",
        CType::I32 => "Int",
        CType::U32 => "Uint",
        CType::I64 => "Int64",
        CType::U64 => "Uint64",
        CType::F32 => "Float",
        CType::F64 => "Double",
        CType::ISize => "Ptrdiff",
        CType::USize => "Size",
        CType::Typedef { name, resolved } if resolved.canonical().is_scalar() => {
            return Some(format!("{name}Ptr"));
        }
        _ => return None,
    };
    Some(format!("{name}Ptr"))
}

/// Boxes the bound functions could use, in parameter order, repeats
/// included.
fn box_candidates<'s>(set: &'s BindingSet<'_>) -> impl Iterator<Item = (String, CType)> + 's {
    set.bindings
        .iter()
        .flat_map(|b| b.params.iter())
        .filter(|p| p.strategy == PassingStrategy::Pointer)
        .filter_map(|p| p.mapping.pointee())
        .filter_map(|pointee| Some((box_name(pointee)?, pointee.clone())))
}

// ---------------------------------------------------------------------------
// CString
// ---------------------------------------------------------------------------

const CSTRING: &str = r#"local CString = {}
CString.__index = CString

function M.CString(capacity, text)
  assert(capacity > 0, "CString capacity must be positive")
  local self = setmetatable({ buf = ffi.new("char[?]", capacity), size = capacity }, CString)
  if text then self:set(text) end
  return self
end

function CString:set(text)
  local n = math.min(#text, self.size - 1)
  ffi.copy(self.buf, text, n)
  self.buf[n] = 0
end

function CString:get() return ffi.string(self.buf) end
function CString:cdata() return self.buf end
function CString:capacity() return self.size end
function CString:len() return #ffi.string(self.buf) end
"#;

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

fn function(binding: &EmittedBinding<'_>, scope: &DefaultScope) -> String {
    let name = &binding.emitted_name;
    let mut params: Vec<&str> = binding.params.iter().map(|p| p.name.as_str()).collect();
    let mut args: Vec<String> = binding.params.iter().map(|p| p.name.clone()).collect();
    if binding.func.is_variadic {
        params.push("...");
        args.push("...".into());
    }

    let mut body: Vec<String> = Vec::new();
    let mut optional = vec![false; binding.params.len()];
    for (i, p) in binding.params.iter().enumerate() {
        let Some(default) = &p.default_value else {
            continue;
        };
        match luaify::translate(default, &p.mapping.foreign, scope) {
            Some(v) if v == "nil" => {
                optional[i] = true;
                body.push(format!("-- {} is optional and may be nil", p.name));
            }
            Some(v) => {
                optional[i] = true;
                body.push(format!("if {0} == nil then {0} = {v} end", p.name));
            }
            None => debug!(
                function = %name,
                param = %p.name,
                default = %default,
                "default value not translated; parameter stays required"
            ),
        }
    }

    for (i, p) in binding.params.iter().enumerate() {
        if !optional[i] && needs_nil_check(p) {
            body.push(format!(
                "if {0} == nil then error(\"{name}: parameter '{0}' cannot be nil\", 2) end",
                p.name
            ));
        }
    }

    for p in &binding.params {
        if let ParamRole::Buffer { length } = p.role {
            let len = &binding.params[length].name;
            body.push(format!("if type({0}) == \"table\" then", p.name));
            body.push(format!("  if {len} == nil then {len} = {}:capacity() end", p.name));
            body.push(format!("  {0} = {0}:cdata()", p.name));
            body.push("end".into());
        } else if let Some(shape) = p.array_vector() {
            body.push(format!(
                "if ffi.istype({}_t, {1}) then {1} = {1}:ptr() end",
                shape.type_name, p.name
            ));
        }
    }

    let call = format!("C.{}({})", binding.symbol, args.join(", "));
    let call = if matches!(binding.ret.foreign, CType::Void) {
        call
    } else {
        format!("return {call}")
    };

    let header = format!("function M.{name}({})", params.join(", "));
    if body.is_empty() {
        format!("{header} {call} end\n")
    } else {
        let mut out = header;
        out.push('\n');
        for line in body {
            let _ = writeln!(out, "  {line}");
        }
        let _ = writeln!(out, "  {call}\nend");
        out
    }
}

fn needs_nil_check(p: &BoundParam) -> bool {
    match p.role {
        ParamRole::Receiver | ParamRole::Buffer { .. } => true,
        ParamRole::BufferLength { .. } => false,
        ParamRole::Plain => matches!(
            p.strategy,
            PassingStrategy::Pointer | PassingStrategy::FixedArray
        ),
    }
}
