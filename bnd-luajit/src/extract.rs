//! Extraction: clang `Entity`/`Type` → intermediate model types.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use clang::diagnostic::Severity;
use clang::{Accessibility, Entity, EntityKind, Index, Type as ClangType, TypeKind};
use tracing::{debug, info, trace, warn};

use crate::diag::{Diagnostic, DiagnosticKind};
use crate::model::*;

/// Parse `header` and extract every declaration located in it.
///
/// clang errors are logged and extraction continues with whatever clang
/// recovered; only a missing translation unit is fatal.
pub fn extract_header(index: &Index, header: &Path, args: &[String]) -> Result<TranslationUnit> {
    debug!(header = %header.display(), args = ?args, "parsing header");
    let tu = index
        .parser(header)
        .arguments(&args.iter().map(|s| s.as_str()).collect::<Vec<_>>())
        .skip_function_bodies(true)
        .parse()
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {:?}", header.display(), e))?;

    for d in tu.get_diagnostics() {
        if matches!(d.get_severity(), Severity::Error | Severity::Fatal) {
            warn!(diagnostic = %d.get_text(), "clang error");
        }
    }

    let mut walker = Walker {
        header,
        unit: TranslationUnit::new(header),
        seen_usrs: HashSet::new(),
        records: HashSet::new(),
    };
    walker.visit_children(&tu.get_entity(), &mut Vec::new());

    let unit = walker.unit;
    info!(
        header = %header.display(),
        declarations = unit.declarations.len(),
        functions = unit.functions().count(),
        rejected = unit.diagnostics.len(),
        "extraction complete"
    );
    Ok(unit)
}

struct Walker<'h> {
    header: &'h Path,
    unit: TranslationUnit,
    seen_usrs: HashSet<String>,
    /// Record names already pushed with a definition.
    records: HashSet<String>,
}

impl Walker<'_> {
    fn visit_children(&mut self, parent: &Entity, scope: &mut Vec<String>) {
        let children = parent.get_children();
        for (i, child) in children.iter().enumerate() {
            match child.get_kind() {
                EntityKind::Namespace => {
                    let name = child.get_name().unwrap_or_default();
                    // Anonymous namespaces have internal linkage.
                    if name.is_empty() {
                        continue;
                    }
                    scope.push(name);
                    self.visit_children(child, scope);
                    scope.pop();
                }
                EntityKind::LinkageSpec | EntityKind::UnexposedDecl => {
                    self.visit_children(child, scope)
                }
                _ if !should_emit_by_location(child, self.header) => {}
                EntityKind::FunctionDecl => self.function(child, scope),
                EntityKind::StructDecl | EntityKind::ClassDecl | EntityKind::UnionDecl => {
                    match record_name(child) {
                        Some(name) => self.record(child, &name, scope),
                        None if named_by_next_typedef(child, children.get(i + 1)) => {}
                        None => trace!("skipping anonymous record"),
                    }
                }
                EntityKind::EnumDecl => match record_name(child) {
                    Some(name) => self.enumeration(child, &name, false, scope),
                    None if named_by_next_typedef(child, children.get(i + 1)) => {}
                    None => self.enumeration(child, "", true, scope),
                },
                EntityKind::TypedefDecl | EntityKind::TypeAliasDecl => self.typedef(child, scope),
                EntityKind::ClassTemplate | EntityKind::ClassTemplatePartialSpecialization => {
                    if let Some(name) = child.get_name() {
                        self.reject(child, &name, "template".into());
                    }
                }
                other => trace!(kind = ?other, name = ?child.get_name(), "skipping entity"),
            }
        }
    }

    fn push(&mut self, entity: &Entity, name: &str, scope: &[String], kind: DeclKind) {
        self.unit.declarations.push(Declaration {
            source_name: name.to_string(),
            scope: scope.to_vec(),
            location: source_location(entity),
            doc: entity.get_comment(),
            kind,
        });
    }

    fn function(&mut self, entity: &Entity, scope: &[String]) {
        let Some(name) = entity.get_name() else {
            return;
        };
        if name.starts_with("operator") {
            trace!(name = %name, "skipping operator");
            return;
        }
        if let Some(usr) = entity.get_usr()
            && !self.seen_usrs.insert(usr.0)
        {
            trace!(name = %name, "skipping redeclaration");
            return;
        }
        let f = extract_function(entity, None);
        debug!(name = %name, params = f.params.len(), variadic = f.is_variadic, "extracted function");
        self.push(entity, &name, scope, DeclKind::Function(f));
    }

    fn record(&mut self, entity: &Entity, name: &str, scope: &[String]) {
        let is_union = entity.get_kind() == EntityKind::UnionDecl;
        if !entity.is_definition() {
            let known = self
                .unit
                .declarations
                .iter()
                .any(|d| d.source_name == name && matches!(d.kind, DeclKind::Struct(_)));
            if !known {
                debug!(name = %name, "forward-declared record, opaque");
                self.push(
                    entity,
                    name,
                    scope,
                    DeclKind::Struct(StructDecl {
                        is_union,
                        is_opaque: true,
                        size: 0,
                        align: 0,
                        fields: Vec::new(),
                    }),
                );
            }
            return;
        }
        if !self.records.insert(name.to_string()) {
            return;
        }
        match extract_record(entity, name) {
            Ok(record) => {
                debug!(
                    name = %name,
                    fields = record.decl.fields.len(),
                    size = record.decl.size,
                    methods = record.methods.len(),
                    "extracted struct"
                );
                for (nested_name, nested) in record.nested {
                    debug!(parent = %name, synthetic = %nested_name, "  nested anonymous type");
                    self.push(entity, &nested_name, scope, DeclKind::Struct(nested));
                }
                self.push(entity, name, scope, DeclKind::Struct(record.decl));
                for method in record.methods {
                    let Some(method_name) = method.get_name() else {
                        continue;
                    };
                    if let Some(usr) = method.get_usr()
                        && !self.seen_usrs.insert(usr.0)
                    {
                        continue;
                    }
                    let f = extract_function(
                        &method,
                        Some(Method {
                            record: name.to_string(),
                            is_static: method.is_static_method(),
                            is_const: method.is_const_method(),
                        }),
                    );
                    debug!(record = %name, name = %method_name, params = f.params.len(), "extracted method");
                    self.push(&method, &method_name, scope, DeclKind::Function(f));
                }
            }
            Err(reason) => self.reject(entity, name, reason),
        }
    }

    fn reject(&mut self, entity: &Entity, name: &str, reason: String) {
        let diag = Diagnostic::new(
            name,
            Some(source_location(entity)),
            DiagnosticKind::RejectedStruct { reason },
        );
        warn!("{diag}");
        self.unit.diagnostics.push(diag);
    }

    fn enumeration(&mut self, entity: &Entity, name: &str, is_anonymous: bool, scope: &[String]) {
        if !entity.is_definition() {
            trace!(name = %name, "skipping opaque enum declaration");
            return;
        }
        let e = extract_enum(entity, is_anonymous);
        debug!(name = %name, variants = e.variants.len(), "extracted enum");
        self.push(entity, name, scope, DeclKind::Enum(e));
    }

    fn typedef(&mut self, entity: &Entity, scope: &[String]) {
        let Some(name) = entity.get_name().filter(|n| !n.is_empty()) else {
            return;
        };
        let Some(underlying) = entity.get_typedef_underlying_type() else {
            return;
        };
        let canonical = underlying.get_canonical_type();
        if let Some(decl) = canonical.get_declaration() {
            match (canonical.get_kind(), record_name(&decl)) {
                // `typedef struct { ... } Name;`
                (TypeKind::Record, None) => {
                    self.record(&decl, &name, scope);
                    return;
                }
                (TypeKind::Enum, None) => {
                    self.enumeration(&decl, &name, false, scope);
                    return;
                }
                // `typedef struct Name Name;`
                (TypeKind::Record | TypeKind::Enum, Some(tag)) if tag == name => {
                    trace!(name = %name, "skipping struct/enum passthrough typedef");
                    return;
                }
                _ => {}
            }
        }
        let ty = map_clang_type(&underlying);
        trace!(name = %name, ty = %ty, "extracted typedef");
        self.push(entity, &name, scope, DeclKind::Typedef(TypedefDecl { underlying: ty }));
    }
}

// ---------------------------------------------------------------------------
// Record extraction
// ---------------------------------------------------------------------------

struct Record<'tu> {
    decl: StructDecl,
    /// Synthetic types for anonymous nested records, innermost first.
    nested: Vec<(String, StructDecl)>,
    /// Public non-virtual member functions.
    methods: Vec<Entity<'tu>>,
}

/// Extract a plain-old-data record, or explain why it is not one.
fn extract_record<'tu>(entity: &Entity<'tu>, name: &str) -> Result<Record<'tu>, String> {
    let ty = entity.get_type().ok_or("record has no type")?;
    let size = ty
        .get_sizeof()
        .map_err(|e| format!("size unknown ({e:?})"))?;
    let align = ty.get_alignof().unwrap_or(1);
    let is_union = entity.get_kind() == EntityKind::UnionDecl;

    let mut fields = Vec::new();
    let mut nested = Vec::new();
    let mut methods = Vec::new();
    let mut anonymous_members = 0;
    let children = entity.get_children();
    for (i, child) in children.iter().enumerate() {
        let public = child.get_accessibility().is_none_or(|a| a == Accessibility::Public);
        match child.get_kind() {
            EntityKind::BaseSpecifier => {
                let base = child.get_type().map(|t| t.get_display_name()).unwrap_or_default();
                return Err(format!("base class `{base}`"));
            }
            EntityKind::Method => {
                let method = child.get_name().unwrap_or_default();
                if child.is_virtual_method() {
                    return Err(format!("virtual method `{method}`"));
                }
                if public && !method.starts_with("operator") {
                    methods.push(*child);
                }
            }
            EntityKind::Destructor if child.is_virtual_method() => {
                return Err("virtual destructor".into());
            }
            EntityKind::FunctionTemplate => {
                let method = child.get_name().unwrap_or_default();
                return Err(format!("member template `{method}`"));
            }
            EntityKind::StructDecl | EntityKind::UnionDecl if record_name(child).is_none() => {
                if named_field_follows(child, children.get(i + 1)) {
                    continue;
                }
                // `union { int a; float b; };`: an anonymous member.
                let synthetic = format!("{name}_anon{anonymous_members}");
                anonymous_members += 1;
                let inner = extract_record(child, &synthetic)
                    .map_err(|e| format!("anonymous member: {e}"))?;
                nested.extend(inner.nested);
                nested.push((synthetic.clone(), inner.decl));
                fields.push(FieldDef {
                    name: String::new(),
                    ty: CType::record(&synthetic),
                    bitfield_width: None,
                });
            }
            EntityKind::FieldDecl => {
                let field_name = child.get_name().unwrap_or_default();
                if !public {
                    return Err(format!("non-public field `{field_name}`"));
                }
                let field_type = child.get_type().ok_or("field has no type")?;
                let ty = match anonymous_field_record(&field_type) {
                    Some(decl) => {
                        let synthetic = format!("{name}_{field_name}");
                        let inner = extract_record(&decl, &synthetic)
                            .map_err(|e| format!("field `{field_name}`: {e}"))?;
                        nested.extend(inner.nested);
                        nested.push((synthetic.clone(), inner.decl));
                        CType::record(&synthetic)
                    }
                    None => map_clang_type(&field_type),
                };
                check_field_type(&field_name, &ty)?;
                let bitfield_width = if child.is_bit_field() {
                    child.get_bit_field_width()
                } else {
                    None
                };
                trace!(field = %field_name, ty = %ty, "  field");
                fields.push(FieldDef {
                    name: field_name,
                    ty,
                    bitfield_width,
                });
            }
            _ => {}
        }
    }

    Ok(Record {
        decl: StructDecl {
            is_union,
            is_opaque: false,
            size,
            align,
            fields,
        },
        nested,
        methods,
    })
}

fn check_field_type(field: &str, ty: &CType) -> Result<(), String> {
    match ty {
        CType::Ref { .. } => Err(format!("reference field `{field}`")),
        CType::Unsupported { spelling } => {
            Err(format!("field `{field}` has unsupported type `{spelling}`"))
        }
        CType::Array { element, .. } => check_field_type(field, element),
        CType::Typedef { resolved, .. } => check_field_type(field, resolved),
        _ => Ok(()),
    }
}

/// The declaration of an anonymous record used as a field type
/// (`struct { int a; } field;`).
fn anonymous_field_record<'tu>(field_type: &ClangType<'tu>) -> Option<Entity<'tu>> {
    let canonical = field_type.get_canonical_type();
    if canonical.get_kind() != TypeKind::Record {
        return None;
    }
    let decl = canonical.get_declaration()?;
    record_name(&decl).is_none().then_some(decl)
}

/// True when `next` is a field whose type is the anonymous `record`.
fn named_field_follows(record: &Entity, next: Option<&Entity>) -> bool {
    next.filter(|n| n.get_kind() == EntityKind::FieldDecl)
        .and_then(|n| n.get_type())
        .and_then(|t| t.get_canonical_type().get_declaration())
        .is_some_and(|d| d == *record)
}

/// True when `next` is a typedef naming the anonymous `tagged` declaration.
fn named_by_next_typedef(tagged: &Entity, next: Option<&Entity>) -> bool {
    next.filter(|n| {
        matches!(
            n.get_kind(),
            EntityKind::TypedefDecl | EntityKind::TypeAliasDecl
        )
    })
    .and_then(|n| n.get_typedef_underlying_type())
    .and_then(|t| t.get_canonical_type().get_declaration())
    .is_some_and(|d| d == *tagged)
}

/// Tag name of a struct/union/enum, or `None` when it is anonymous.
fn record_name(entity: &Entity) -> Option<String> {
    entity
        .get_name()
        .filter(|n| !n.is_empty() && !n.contains('('))
}

// ---------------------------------------------------------------------------
// Enum extraction
// ---------------------------------------------------------------------------

fn extract_enum(entity: &Entity, is_anonymous: bool) -> EnumDecl {
    let underlying = entity
        .get_enum_underlying_type()
        .map(|t| map_clang_type(&t))
        .filter(|t| t.canonical().is_integer())
        .unwrap_or(CType::I32);

    let mut variants = Vec::new();
    for child in entity.get_children() {
        if child.get_kind() != EntityKind::EnumConstantDecl {
            continue;
        }
        let name = child.get_name().unwrap_or_default();
        let (signed, unsigned) = child.get_enum_constant_value().unwrap_or((0, 0));
        variants.push(EnumVariant {
            name,
            signed_value: signed,
            unsigned_value: unsigned,
        });
    }

    EnumDecl {
        underlying,
        variants,
        is_anonymous,
    }
}

// ---------------------------------------------------------------------------
// Function extraction
// ---------------------------------------------------------------------------

fn extract_function(entity: &Entity, method: Option<Method>) -> FunctionDecl {
    let return_type = entity
        .get_result_type()
        .map(|t| map_clang_type(&t))
        .unwrap_or(CType::Void);

    let args = entity.get_arguments().unwrap_or_default();
    let mut params = Vec::with_capacity(args.len());
    for arg in &args {
        let name = arg.get_name().unwrap_or_default();
        let clang_type = arg.get_type();
        let ty = clang_type
            .as_ref()
            .map(map_clang_type)
            .unwrap_or_else(|| CType::Unsupported {
                spelling: "<unknown>".into(),
            });
        let spelling = clang_type.map(|t| t.get_display_name());
        params.push(
            Parameter::new(name, ty)
                .with_default(default_value(arg))
                .with_native_spelling(spelling),
        );
    }

    FunctionDecl {
        return_type,
        params,
        is_variadic: entity.is_variadic(),
        method,
        usr: entity.get_usr().map(|u| u.0),
    }
}

/// Default argument of a parameter, re-spelled from its tokens.
fn default_value(param: &Entity) -> Option<String> {
    let tokens: Vec<String> = param
        .get_range()?
        .tokenize()
        .iter()
        .map(|t| t.get_spelling())
        .collect();
    let eq = tokens.iter().position(|t| t == "=")?;
    let mut depth = 0usize;
    let mut end = tokens.len();
    for (i, t) in tokens.iter().enumerate().skip(eq + 1) {
        match t.as_str() {
            "(" | "{" | "[" => depth += 1,
            ")" | "}" | "]" if depth == 0 => {
                end = i;
                break;
            }
            ")" | "}" | "]" => depth -= 1,
            "," if depth == 0 => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    let value = join_tokens(&tokens[eq + 1..end]);
    (!value.is_empty()).then_some(value)
}

/// Join tokens the way they would be written by hand: `Vec2(0, 0)`,
/// `-FLT_MIN`, `A | B`.
fn join_tokens(tokens: &[String]) -> String {
    let mut out = String::new();
    for (i, t) in tokens.iter().enumerate() {
        if i > 0 {
            let prev = tokens[i - 1].as_str();
            let unary_minus = prev == "-"
                && (i == 1 || matches!(tokens[i - 2].as_str(), "(" | "," | "|" | "="));
            let tight = matches!(t.as_str(), ")" | "," | "(" | "]" | "[" | "::")
                || matches!(prev, "(" | "[" | "::")
                || unary_minus;
            if !tight {
                out.push(' ');
            }
        }
        out.push_str(t);
    }
    out
}

// ---------------------------------------------------------------------------
// Type mapping: clang TypeKind → CType
// ---------------------------------------------------------------------------

fn unsupported(ty: &ClangType) -> CType {
    CType::Unsupported {
        spelling: ty.get_display_name(),
    }
}

/// Map a clang type. Anything outside the supported subset becomes
/// [`CType::Unsupported`]; the type mapper decides what that excludes.
fn map_clang_type(ty: &ClangType) -> CType {
    match ty.get_kind() {
        TypeKind::Void => CType::Void,
        TypeKind::Bool => CType::Bool,
        TypeKind::CharS | TypeKind::CharU => CType::Char,
        TypeKind::SChar => CType::I8,
        TypeKind::UChar => CType::U8,
        TypeKind::Char16 => CType::U16,
        TypeKind::Char32 => CType::U32,
        TypeKind::Short => CType::I16,
        TypeKind::UShort => CType::U16,
        TypeKind::Int => CType::I32,
        TypeKind::UInt => CType::U32,
        // `long` is 32-bit on LLP64 targets.
        TypeKind::Long => match ty.get_sizeof() {
            Ok(4) => CType::I32,
            _ => CType::I64,
        },
        TypeKind::ULong => match ty.get_sizeof() {
            Ok(4) => CType::U32,
            _ => CType::U64,
        },
        TypeKind::LongLong => CType::I64,
        TypeKind::ULongLong => CType::U64,
        TypeKind::Float => CType::F32,
        TypeKind::Double => CType::F64,

        TypeKind::Pointer => match ty.get_pointee_type() {
            Some(pointee) => CType::Ptr {
                is_const: pointee.is_const_qualified(),
                pointee: Box::new(map_clang_type(&pointee)),
            },
            None => unsupported(ty),
        },

        TypeKind::LValueReference => match ty.get_pointee_type() {
            Some(pointee) => CType::Ref {
                is_const: pointee.is_const_qualified(),
                pointee: Box::new(map_clang_type(&pointee)),
            },
            None => unsupported(ty),
        },

        TypeKind::ConstantArray => match (ty.get_element_type(), ty.get_size()) {
            (Some(elem), Some(len)) => CType::array(map_clang_type(&elem), len),
            _ => unsupported(ty),
        },

        // `float v[]` as a parameter.
        TypeKind::IncompleteArray => match ty.get_element_type() {
            Some(elem) => CType::Ptr {
                is_const: elem.is_const_qualified(),
                pointee: Box::new(map_clang_type(&elem)),
            },
            None => unsupported(ty),
        },

        TypeKind::Elaborated => match ty.get_elaborated_type() {
            Some(inner) => map_clang_type(&inner),
            None => unsupported(ty),
        },

        TypeKind::Typedef => {
            let Some(name) = ty
                .get_declaration()
                .and_then(|d| d.get_name())
                .filter(|n| !n.is_empty())
            else {
                return map_clang_type(&ty.get_canonical_type());
            };
            // va_list has no portable layout; `...` forwarders reach the
            // va_list variants instead.
            if matches!(
                name.as_str(),
                "va_list" | "__builtin_va_list" | "__gnuc_va_list"
            ) {
                return CType::Unsupported { spelling: name };
            }
            let canonical = ty.get_canonical_type();
            // `typedef struct { ... } Name;` is known by the typedef's name.
            if let Some(decl) = canonical.get_declaration()
                && record_name(&decl).is_none()
            {
                match canonical.get_kind() {
                    TypeKind::Record => return CType::record(&name),
                    TypeKind::Enum => return CType::Enum { name },
                    _ => {}
                }
            }
            CType::Typedef {
                resolved: Box::new(map_clang_type(&canonical)),
                name,
            }
        }

        TypeKind::Record => {
            let Some(decl) = ty.get_declaration() else {
                return unsupported(ty);
            };
            if ty
                .get_template_argument_types()
                .is_some_and(|args| !args.is_empty())
            {
                return unsupported(ty);
            }
            match record_name(&decl) {
                // Backs va_list on x86-64.
                Some(name) if name == "__va_list_tag" => CType::Unsupported { spelling: name },
                Some(name) => CType::Record { name },
                None => unsupported(ty),
            }
        }

        TypeKind::Enum => match ty.get_declaration().as_ref().and_then(record_name) {
            Some(name) => CType::Enum { name },
            None => ty
                .get_declaration()
                .and_then(|d| d.get_enum_underlying_type())
                .map(|t| map_clang_type(&t))
                .unwrap_or(CType::I32),
        },

        TypeKind::FunctionPrototype => {
            let return_type = ty
                .get_result_type()
                .map(|t| map_clang_type(&t))
                .unwrap_or(CType::Void);
            let params = ty
                .get_argument_types()
                .unwrap_or_default()
                .iter()
                .map(map_clang_type)
                .collect();
            CType::FnPtr {
                return_type: Box::new(return_type),
                params,
                is_variadic: ty.is_variadic(),
            }
        }

        TypeKind::FunctionNoPrototype => CType::FnPtr {
            return_type: Box::new(CType::Void),
            params: vec![],
            is_variadic: false,
        },

        TypeKind::Unexposed => {
            let canonical = ty.get_canonical_type();
            if canonical.get_kind() == TypeKind::Unexposed {
                unsupported(ty)
            } else {
                map_clang_type(&canonical)
            }
        }

        _ => unsupported(ty),
    }
}

// ---------------------------------------------------------------------------
// Source-location filtering
// ---------------------------------------------------------------------------

fn source_location(entity: &Entity) -> SourceLocation {
    let Some(location) = entity.get_location() else {
        return SourceLocation::default();
    };
    let file_location = location.get_file_location();
    SourceLocation {
        file: file_location
            .file
            .map(|f| f.get_path())
            .unwrap_or_default(),
        line: file_location.line,
        column: file_location.column,
    }
}

fn should_emit_by_location(entity: &Entity, header: &Path) -> bool {
    let location = match entity.get_location() {
        Some(loc) => loc,
        None => return false,
    };
    let file = match location.get_file_location().file {
        Some(f) => f,
        None => return false,
    };
    let file_path = file.get_path();
    file_path == header || file_path.ends_with(header)
}
