//! Type declarations for the C interface: enums, typedefs and structs that
//! the bindings reference, each emitted once, in dependency order.

use std::collections::HashSet;

use crate::bind::BindingSet;
use crate::emit::luaify;
use crate::model::*;
use crate::typemap::{TypeIndex, VectorBacking, VectorShape};

/// Everything the interface and wrapper emitters need besides functions.
#[derive(Debug)]
pub struct Layout<'a> {
    /// `ffi.cdef`-ready declarations.
    pub text: String,
    /// Enums in the interface, in source order.
    pub enums: Vec<(&'a Declaration, &'a EnumDecl)>,
    /// Vector-like types the wrapper generates value types for.
    pub vectors: Vec<VectorShape>,
    /// Structs defined in full, in definition order.
    pub records: Vec<RecordShape>,
}

/// A struct the wrapper can construct field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordShape {
    pub name: String,
    /// Named fields in declaration order.
    pub fields: Vec<String>,
}

pub fn build<'a>(set: &BindingSet<'a>, all_enums: bool) -> Layout<'a> {
    let mut builder = Builder {
        index: set.mapper.index(),
        items: Vec::new(),
        records: Vec::new(),
        forwarded: HashSet::new(),
        defined: HashSet::new(),
        in_progress: HashSet::new(),
        typedefs: HashSet::new(),
        enum_names: HashSet::new(),
    };

    for binding in &set.bindings {
        for ty in binding.foreign_types() {
            builder.walk(ty, true);
        }
    }

    let mut vectors: Vec<VectorShape> = Vec::new();
    for mapping in set.bindings.iter().flat_map(|b| b.mappings()) {
        let Some(shape) = &mapping.vector else {
            continue;
        };
        if vectors.iter().any(|v| v.type_name == shape.type_name) {
            continue;
        }
        if shape.backing == VectorBacking::Struct {
            builder.require_struct(&shape.type_name);
        }
        vectors.push(shape.clone());
    }
    for shape in vectors.iter().filter(|v| v.backing == VectorBacking::Array) {
        builder.items.push(format!(
            "typedef struct {name} {{ {field}; }} {name};\n",
            name = shape.type_name,
            field = shape.element.declare(&format!("v[{}]", shape.arity())),
        ));
    }

    // Enums named by a default argument must exist for the wrapper.
    let mut default_constants: HashSet<&str> = HashSet::new();
    for binding in &set.bindings {
        for p in &binding.params {
            if let Some(d) = &p.default_value {
                default_constants.extend(luaify::identifiers(d));
            }
        }
    }

    let mut enums = Vec::new();
    let mut enum_text = String::new();
    for (decl, e) in set.unit.enums() {
        let referenced = builder.enum_names.contains(decl.source_name.as_str())
            || e.variants
                .iter()
                .any(|v| default_constants.contains(v.name.as_str()));
        if !(all_enums || referenced) {
            continue;
        }
        enum_text.push_str(&enum_block(decl, e));
        enum_text.push('\n');
        enums.push((decl, e));
    }

    let mut text = enum_text;
    text.push_str(&builder.items.join("\n"));
    Layout {
        text,
        enums,
        vectors,
        records: builder.records,
    }
}

fn enum_block(decl: &Declaration, e: &EnumDecl) -> String {
    let mut out = String::new();
    if !e.variants.is_empty() {
        out.push_str("enum {\n");
        for v in &e.variants {
            out.push_str(&format!(
                "    {} = {},\n",
                v.name,
                v.value_literal(&e.underlying)
            ));
        }
        out.push_str("};\n");
    }
    if !e.is_anonymous {
        out.push_str(&format!(
            "typedef {};\n",
            e.underlying.canonical().declare(&decl.source_name)
        ));
    }
    out
}

struct Builder<'i, 'a> {
    index: &'i TypeIndex<'a>,
    items: Vec<String>,
    records: Vec<RecordShape>,
    forwarded: HashSet<String>,
    defined: HashSet<String>,
    in_progress: HashSet<String>,
    typedefs: HashSet<String>,
    enum_names: HashSet<String>,
}

impl Builder<'_, '_> {
    /// Visit a foreign type; `by_value` when its complete layout is needed.
    fn walk(&mut self, ty: &CType, by_value: bool) {
        match ty {
            CType::Ptr { pointee, .. } | CType::Ref { pointee, .. } => self.walk(pointee, false),
            CType::Array { element, .. } => self.walk(element, by_value),
            CType::Record { name } => {
                if by_value {
                    self.require_struct(name);
                } else {
                    self.require_forward(name);
                }
            }
            CType::Typedef { name, resolved } => {
                if self.index.find_typedef(name).is_some() {
                    self.require_typedef(name, resolved);
                } else if self.index.find_enum(name).is_some() {
                    self.enum_names.insert(name.clone());
                } else {
                    self.walk(resolved, by_value);
                }
            }
            CType::FnPtr {
                return_type,
                params,
                ..
            } => {
                self.walk(return_type, true);
                for p in params {
                    self.walk(p, true);
                }
            }
            _ => {}
        }
    }

    fn require_forward(&mut self, name: &str) {
        if self.forwarded.contains(name) || self.defined.contains(name) {
            return;
        }
        let keyword = match self.index.find_struct(name) {
            Some(s) if s.is_union => "union",
            _ => "struct",
        };
        self.forwarded.insert(name.to_string());
        self.items.push(format!("typedef {keyword} {name} {name};\n"));
    }

    fn require_struct(&mut self, name: &str) {
        if self.defined.contains(name) || self.in_progress.contains(name) {
            return;
        }
        let Some(decl) = self.index.find_struct(name).filter(|s| !s.is_opaque) else {
            self.require_forward(name);
            return;
        };
        self.in_progress.insert(name.to_string());
        let body = self.field_lines(decl, 1);
        self.in_progress.remove(name);

        let keyword = if decl.is_union { "union" } else { "struct" };
        let mut out = format!(
            "/* {name}: size {}, align {} */\n",
            decl.size, decl.align
        );
        if self.forwarded.contains(name) {
            out.push_str(&format!("{keyword} {name} {{\n"));
        } else {
            out.push_str(&format!("typedef {keyword} {name} {{\n"));
        }
        out.push_str(&body);
        if self.forwarded.contains(name) {
            out.push_str("};\n");
        } else {
            out.push_str(&format!("}} {name};\n"));
        }
        self.defined.insert(name.to_string());
        self.items.push(out);
        if !decl.is_union {
            self.records.push(RecordShape {
                name: name.to_string(),
                fields: decl
                    .fields
                    .iter()
                    .filter(|f| !f.name.is_empty())
                    .map(|f| f.name.clone())
                    .collect(),
            });
        }
    }

    /// Field declarations of `decl`, requiring every by-value field type
    /// first. Anonymous members are written inline.
    fn field_lines(&mut self, decl: &StructDecl, depth: usize) -> String {
        let pad = "    ".repeat(depth);
        let mut out = String::new();
        for field in &decl.fields {
            if field.name.is_empty()
                && let CType::Record { name } = &field.ty
                && let Some(inner) = self.index.find_struct(name)
            {
                let keyword = if inner.is_union { "union" } else { "struct" };
                out.push_str(&format!("{pad}{keyword} {{\n"));
                out.push_str(&self.field_lines(inner, depth + 1));
                out.push_str(&format!("{pad}}};\n"));
                continue;
            }
            let ty = self.index.foreign_type(&field.ty);
            self.walk(&ty, true);
            match field.bitfield_width {
                Some(w) => out.push_str(&format!("{pad}{} : {w};\n", ty.declare(&field.name))),
                None => out.push_str(&format!("{pad}{};\n", ty.declare(&field.name))),
            }
        }
        out
    }

    fn require_typedef(&mut self, name: &str, resolved: &CType) {
        if !self.typedefs.insert(name.to_string()) {
            return;
        }
        self.walk(resolved, true);
        self.items.push(format!("typedef {};\n", resolved.declare(name)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind;
    use crate::config::Config;
    use crate::fixtures;

    fn layout_text(all_enums: bool) -> String {
        let unit = fixtures::widgets_unit();
        let set = bind::bind(&unit, &Config::default(), "w_").unwrap();
        build(&set, all_enums).text
    }

    #[test]
    fn fields_come_before_their_struct() {
        let text = layout_text(true);
        let vec2 = text.find("struct Vec2 {").expect(&text);
        let style = text.find("struct Style {").expect(&text);
        let flags = text.find("typedef int32_t WidgetFlags;").expect(&text);
        assert!(vec2 < style, "{text}");
        assert!(flags < style, "{text}");
        assert!(text.contains("/* Style: size 24, align 4 */"), "{text}");
        assert!(text.contains("    uint32_t bits : 3;"), "{text}");
    }

    #[test]
    fn pointer_only_records_are_forward_declared() {
        let text = layout_text(true);
        assert!(text.contains("typedef struct Window Window;"), "{text}");
        assert!(!text.contains("struct Window {"), "{text}");
    }

    #[test]
    fn each_type_is_emitted_once() {
        let text = layout_text(true);
        assert_eq!(text.matches("struct Vec2 {").count(), 1, "{text}");
        assert_eq!(text.matches("typedef int32_t WidgetFlags;").count(), 1, "{text}");
    }

    #[test]
    fn enums_lead_with_explicit_values() {
        let text = layout_text(true);
        assert!(text.starts_with("enum {\n"), "{text}");
        assert!(text.contains("    Dir_None = -1,\n"), "{text}");
        assert!(text.contains("typedef int32_t Dir;"), "{text}");
        assert!(text.contains("typedef uint8_t Tint;"), "{text}");
        assert!(text.contains("    Tint_Max = 255,\n"), "{text}");
    }

    #[test]
    fn unreferenced_enums_can_be_dropped() {
        let text = layout_text(false);
        // `Dir` is a parameter type, `WidgetFlags_` feeds a default argument.
        assert!(text.contains("typedef int32_t Dir;"), "{text}");
        assert!(text.contains("WidgetFlags_None = 0"), "{text}");
        assert!(!text.contains("Tint_Max"), "{text}");
    }

    #[test]
    fn complete_structs_are_listed_for_construction() {
        let unit = fixtures::widgets_unit();
        let set = bind::bind(&unit, &Config::default(), "w_").unwrap();
        let layout = build(&set, true);
        let style = layout
            .records
            .iter()
            .find(|r| r.name == "Style")
            .expect("Style is defined");
        assert_eq!(style.fields, ["alpha", "padding", "flags", "dir", "bits"]);
        let vec2 = layout.records.iter().position(|r| r.name == "Vec2").unwrap();
        let style = layout.records.iter().position(|r| r.name == "Style").unwrap();
        assert!(vec2 < style);
        assert!(!layout.records.iter().any(|r| r.name == "Window"));
    }

    #[test]
    fn array_vectors_get_a_wrapper_struct() {
        let text = layout_text(true);
        assert!(
            text.contains("typedef struct Float3 { float v[3]; } Float3;"),
            "{text}"
        );
    }
}
