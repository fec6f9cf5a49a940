//! Raw C interface: the text handed to `ffi.cdef`.

use crate::bind::{BindingSet, EmittedBinding};
use crate::emit::layout::Layout;
use crate::emit::{EmitContext, banner};

pub fn emit(set: &BindingSet<'_>, layout: &Layout<'_>, ctx: &EmitContext<'_>) -> String {
    let mut out = banner("//");
    out.push_str(&format!(
        "// LuaJIT FFI declarations for `{}`. Pass to ffi.cdef; not a C header.\n\n",
        ctx.module
    ));
    if !layout.text.is_empty() {
        out.push_str(&layout.text);
        out.push('\n');
    }
    for binding in &set.bindings {
        out.push_str(&prototype(binding));
        out.push_str(";\n");
    }
    out
}

/// `ret symbol(params)` with foreign types only.
pub fn prototype(binding: &EmittedBinding<'_>) -> String {
    let mut params: Vec<String> = binding
        .params
        .iter()
        .map(|p| p.mapping.foreign.declare(&p.native_name))
        .collect();
    if binding.func.is_variadic {
        params.push("...".into());
    }
    if params.is_empty() {
        params.push("void".into());
    }
    binding
        .ret
        .foreign
        .declare(&format!("{}({})", binding.symbol, params.join(", ")))
}
