//! Host shim: a C++ source that exports every flat symbol of the interface
//! and forwards it to the scoped native call.

use std::fmt::Write as _;

use crate::bind::{BindingSet, BoundParam, EmittedBinding};
use crate::emit::cdef::prototype;
use crate::emit::{EmitContext, banner};
use crate::model::CType;

const PRELUDE: &str = r#"#include <cstdarg>
#include <cstddef>
#include <cstdint>

#if defined(_WIN32)
  #define FFI_EXPORT __declspec(dllexport)
#else
  #define FFI_EXPORT __attribute__((visibility("default")))
#endif
"#;

pub fn emit(set: &BindingSet<'_>, ctx: &EmitContext<'_>) -> String {
    let mut out = banner("//");
    let _ = writeln!(
        out,
        "// Host exports for `{}`. Compile into the host executable or library.\n",
        ctx.module
    );
    let _ = writeln!(out, "#include \"{}\"", ctx.include);
    out.push_str(PRELUDE);
    out.push('\n');

    let mut scopes: Vec<String> = Vec::new();
    for decl in &set.unit.declarations {
        if decl.as_function().is_some() || decl.scope.is_empty() {
            continue;
        }
        let scope = decl.scope.join("::");
        if !scopes.contains(&scope) {
            scopes.push(scope);
        }
    }
    for scope in &scopes {
        let _ = writeln!(out, "using namespace {scope};");
    }
    if !scopes.is_empty() {
        out.push('\n');
    }

    out.push_str("extern \"C\" {\n\n");
    for binding in &set.bindings {
        out.push_str(&forwarder(binding, &ctx.config.symbols.variadic_suffix));
        out.push('\n');
    }
    out.push_str("} // extern \"C\"\n\n#undef FFI_EXPORT\n");
    out
}

fn forwarder(binding: &EmittedBinding<'_>, variadic_suffix: &str) -> String {
    let func = binding.func;
    let mut args: Vec<String> = binding
        .params
        .iter()
        .filter(|p| !p.is_receiver())
        .map(argument)
        .collect();

    let mut target = if func.has_receiver() {
        format!("self->{}", binding.decl.source_name)
    } else {
        binding.decl.qualified_name()
    };
    let last_named = binding
        .params
        .iter()
        .rfind(|p| !p.is_receiver())
        .map(|p| p.native_name.as_str());
    if func.is_variadic {
        target.push_str(variadic_suffix);
        args.push("args".into());
    }
    let call = format!("{target}({})", args.join(", "));
    let value = if binding.ret.by_reference {
        format!("&{call}")
    } else {
        call
    };
    let value = if needs_cast(&binding.ret.foreign) {
        format!("reinterpret_cast<{}>({value})", binding.ret.foreign.spelling())
    } else {
        value
    };
    let returns = !matches!(binding.ret.foreign, CType::Void);

    let mut out = format!("FFI_EXPORT {} {{\n", prototype(binding));
    match last_named {
        Some(last) if func.is_variadic => {
            let _ = writeln!(out, "  va_list args;\n  va_start(args, {last});");
            if returns {
                let _ = writeln!(out, "  {} = {value};", binding.ret.foreign.declare("result"));
                out.push_str("  va_end(args);\n  return result;\n");
            } else {
                let _ = writeln!(out, "  {value};");
                out.push_str("  va_end(args);\n");
            }
        }
        _ if returns => {
            let _ = writeln!(out, "  return {value};");
        }
        _ => {
            let _ = writeln!(out, "  {value};");
        }
    }
    out.push_str("}\n");
    out
}

/// Expression passing `p` to the native call.
fn argument(p: &BoundParam) -> String {
    let name = &p.native_name;
    let native = p
        .native_spelling
        .as_deref()
        .filter(|_| needs_cast(&p.mapping.foreign));
    match native {
        Some(native) => {
            let cast = format!("reinterpret_cast<{}>({name})", pointer_spelling(native));
            if p.mapping.by_reference {
                format!("*{cast}")
            } else {
                cast
            }
        }
        None if p.mapping.by_reference => format!("*{name}"),
        None => name.clone(),
    }
}

/// Whether the foreign spelling of an indirect integer may name a different
/// C++ type than the header does (`int64_t *` against `long long *`).
fn needs_cast(foreign: &CType) -> bool {
    match foreign {
        CType::Ptr { pointee, .. } => matches!(
            **pointee,
            CType::I16
                | CType::U16
                | CType::I32
                | CType::U32
                | CType::I64
                | CType::U64
                | CType::ISize
                | CType::USize
        ),
        CType::Array { element, .. } => needs_cast(&CType::ptr((**element).clone())),
        _ => false,
    }
}

/// `long long &` and `long long[3]` become `long long *`.
fn pointer_spelling(native: &str) -> String {
    let native = native.trim_end();
    if let Some(referent) = native.strip_suffix('&') {
        format!("{} *", referent.trim_end())
    } else if native.ends_with(']')
        && let Some(open) = native.find('[')
    {
        format!("{} *", native[..open].trim_end())
    } else {
        native.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind;
    use crate::config::Config;
    use crate::fixtures;

    fn host() -> String {
        let unit = fixtures::widgets_unit();
        let cfg = Config::default();
        let set = bind::bind(&unit, &cfg, "w_").unwrap();
        let ctx = EmitContext {
            config: &cfg,
            module: "widgets",
            prefix: "w_",
            include: "widgets.h",
        };
        emit(&set, &ctx)
    }

    #[test]
    fn forwards_to_the_scoped_call() {
        let cpp = host();
        assert!(cpp.contains("#include \"widgets.h\"\n"), "{cpp}");
        assert!(
            cpp.contains("FFI_EXPORT void w_Foo2(int32_t a, int32_t b) {\n  W::Foo(a, b);\n}\n"),
            "{cpp}"
        );
        assert!(cpp.contains("using namespace W;\n"), "{cpp}");
    }

    #[test]
    fn references_are_dereferenced_and_returned_by_address() {
        let cpp = host();
        assert!(cpp.contains("  return W::Button(label, *size);\n"), "{cpp}");
        assert!(
            cpp.contains("FFI_EXPORT Style *w_GetStyle(void) {\n  return &W::GetStyle();\n}\n"),
            "{cpp}"
        );
    }

    #[test]
    fn methods_call_through_self() {
        let cpp = host();
        assert!(
            cpp.contains("FFI_EXPORT void w_Style_ScaleAll(Style *self, float factor) {\n  self->ScaleAll(factor);\n}\n"),
            "{cpp}"
        );
    }

    #[test]
    fn wide_integer_pointers_are_cast_to_the_header_spelling() {
        let unit = fixtures::wide_integers_unit();
        let cfg = Config::default();
        let set = bind::bind(&unit, &cfg, "n_").unwrap();
        let ctx = EmitContext {
            config: &cfg,
            module: "numbers",
            prefix: "n_",
            include: "numbers.h",
        };
        let cpp = emit(&set, &ctx);
        assert!(
            cpp.contains(
                "FFI_EXPORT void n_Accumulate(int64_t *total, const int64_t *step, int32_t count) {\n  Accumulate(reinterpret_cast<long long *>(total), *reinterpret_cast<const long *>(step), count);\n}\n"
            ),
            "{cpp}"
        );
        assert!(
            cpp.contains("  return reinterpret_cast<uint64_t *>(Counter());\n"),
            "{cpp}"
        );
        assert!(cpp.contains("Fill(reinterpret_cast<long long *>(v));"), "{cpp}");
    }

    #[test]
    fn pointer_spellings() {
        assert_eq!(pointer_spelling("const long &"), "const long *");
        assert_eq!(pointer_spelling("long long[3]"), "long long *");
        assert_eq!(pointer_spelling("unsigned long *"), "unsigned long *");
    }

    #[test]
    fn variadics_call_the_va_list_variant() {
        let cpp = host();
        assert!(
            cpp.contains(
                "FFI_EXPORT void w_Text(const char *fmt, ...) {\n  va_list args;\n  va_start(args, fmt);\n  W::TextV(fmt, args);\n  va_end(args);\n}\n"
            ),
            "{cpp}"
        );
    }
}
