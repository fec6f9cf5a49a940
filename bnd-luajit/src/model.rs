//! Intermediate model types: the bridge between clang extraction and code emission.
//!
//! These types are clang-independent, so the type mapper, the overload resolver
//! and every emitter can be tested against hand-built declarations.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

use crate::diag::Diagnostic;

/// Everything extracted from one header, in source order.
#[derive(Debug, Default)]
pub struct TranslationUnit {
    /// The header the declarations were taken from.
    pub header: PathBuf,
    pub declarations: Vec<Declaration>,
    /// Diagnostics raised during extraction (rejected structs, skipped records).
    pub diagnostics: Vec<Diagnostic>,
}

impl TranslationUnit {
    pub fn new(header: impl Into<PathBuf>) -> Self {
        Self {
            header: header.into(),
            ..Default::default()
        }
    }

    /// Function declarations with their position in `declarations`.
    pub fn functions(&self) -> impl Iterator<Item = (usize, &Declaration, &FunctionDecl)> {
        self.declarations
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.as_function().map(|f| (i, d, f)))
    }

    /// Enum declarations, in source order.
    pub fn enums(&self) -> impl Iterator<Item = (&Declaration, &EnumDecl)> {
        self.declarations.iter().filter_map(|d| match &d.kind {
            DeclKind::Enum(e) => Some((d, e)),
            _ => None,
        })
    }

    /// Returns true if a struct named `name` was rejected during extraction.
    pub fn is_rejected(&self, name: &str) -> bool {
        self.diagnostics.iter().any(|d| {
            d.subject == name && matches!(d.kind, crate::diag::DiagnosticKind::RejectedStruct { .. })
        })
    }
}

/// Where a declaration was found in the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// One normalized top-level declaration.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub source_name: String,
    /// Enclosing namespaces, outermost first.
    pub scope: Vec<String>,
    pub location: SourceLocation,
    /// Raw doc comment attached to the declaration, if any.
    pub doc: Option<String>,
    pub kind: DeclKind,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Function(FunctionDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Typedef(TypedefDecl),
}

impl Declaration {
    pub fn as_function(&self) -> Option<&FunctionDecl> {
        match &self.kind {
            DeclKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            DeclKind::Function(_) => "function",
            DeclKind::Struct(_) => "struct",
            DeclKind::Enum(_) => "enum",
            DeclKind::Typedef(_) => "typedef",
        }
    }

    /// Name used for overload grouping and emitted symbols. Member functions
    /// are flattened to `Struct_method`.
    pub fn flat_name(&self) -> String {
        match self.as_function().and_then(|f| f.method.as_ref()) {
            Some(m) => format!("{}_{}", m.record, self.source_name),
            None => self.source_name.clone(),
        }
    }

    /// C++ path used to call the declaration from the host shim,
    /// e.g. `ImGui::Button` or `ImDrawList::Static`.
    pub fn qualified_name(&self) -> String {
        let mut parts: Vec<&str> = self.scope.iter().map(String::as_str).collect();
        if let Some(m) = self.as_function().and_then(|f| f.method.as_ref()) {
            parts.push(&m.record);
        }
        parts.push(&self.source_name);
        parts.join("::")
    }
}

/// A free function or a member function of an accepted struct.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub return_type: CType,
    pub params: Vec<Parameter>,
    pub is_variadic: bool,
    pub method: Option<Method>,
    /// clang Unified Symbol Resolution, used by the skip list.
    pub usr: Option<String>,
}

impl FunctionDecl {
    /// Parameter types only; two functions with equal signatures are
    /// indistinguishable through the flat interface.
    pub fn signature(&self) -> (Vec<&CType>, bool, Option<bool>) {
        (
            self.params.iter().map(|p| &p.ty).collect(),
            self.is_variadic,
            self.method.as_ref().map(|m| m.is_const),
        )
    }

    /// True when the function is called through a `self` pointer.
    pub fn has_receiver(&self) -> bool {
        self.method.as_ref().is_some_and(|m| !m.is_static)
    }
}

/// Member-function details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub record: String,
    pub is_static: bool,
    pub is_const: bool,
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: CType,
    /// Default argument, verbatim as written in the header.
    pub default_value: Option<String>,
    /// Syntactic direction; the binder refines it with the configured policy.
    pub direction: Direction,
    pub is_array: bool,
    pub array_length: Option<ArrayLength>,
    /// The type as the header spells it, e.g. `long long *`.
    pub native_spelling: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: CType) -> Self {
        let (is_array, array_length) = match &ty {
            CType::Array { len, .. } => (true, Some(ArrayLength::Static(*len))),
            _ => (false, None),
        };
        let direction = Direction::from_type(&ty);
        Self {
            name: name.into(),
            ty,
            default_value: None,
            direction,
            is_array,
            array_length,
            native_spelling: None,
        }
    }

    pub fn with_default(mut self, value: Option<String>) -> Self {
        self.default_value = value;
        self
    }

    pub fn with_native_spelling(mut self, spelling: Option<String>) -> Self {
        self.native_spelling = spelling;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    InOut,
}

impl Direction {
    /// Writable pointers and arrays of scalars may be written by the callee;
    /// everything else is input only.
    pub fn from_type(ty: &CType) -> Self {
        match ty {
            CType::Ptr {
                pointee,
                is_const: false,
            }
            | CType::Ref {
                pointee,
                is_const: false,
            } if pointee.canonical().is_scalar() => Direction::InOut,
            CType::Array { element, .. } if element.canonical().is_scalar() => Direction::InOut,
            _ => Direction::In,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::InOut => "inout",
        }
    }
}

/// Length of an array-like parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayLength {
    Static(usize),
    /// Linked to the parameter at this index (string buffers).
    Param(usize),
}

/// A struct or union definition.
#[derive(Debug, Clone)]
pub struct StructDecl {
    pub is_union: bool,
    /// Forward declaration only; usable through pointers.
    pub is_opaque: bool,
    pub size: usize,
    pub align: usize,
    pub fields: Vec<FieldDef>,
}

/// A single struct field.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: CType,
    /// If this is a bitfield, the width in bits.
    pub bitfield_width: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    /// The declared underlying integer type.
    pub underlying: CType,
    pub variants: Vec<EnumVariant>,
    /// `enum { A, B };`: only the constants are emitted.
    pub is_anonymous: bool,
}

/// A single enum member with its value as computed by clang.
#[derive(Debug, Clone)]
pub struct EnumVariant {
    pub name: String,
    pub signed_value: i64,
    pub unsigned_value: u64,
}

impl EnumVariant {
    /// The value spelled for the declared underlying type.
    pub fn value_literal(&self, underlying: &CType) -> String {
        match underlying.canonical() {
            CType::U8 | CType::U16 | CType::U32 | CType::U64 | CType::USize | CType::Bool => {
                self.unsigned_value.to_string()
            }
            _ => self.signed_value.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypedefDecl {
    pub underlying: CType,
}

/// A native type: our structured representation of clang's types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CType {
    Void,
    Bool,
    /// Plain `char`, kept apart from `I8` so `const char*` reads as a string.
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    ISize,
    USize,
    /// Pointer to a type. `is_const` indicates `const T*`.
    Ptr {
        pointee: Box<CType>,
        is_const: bool,
    },
    /// C++ lvalue reference. `is_const` indicates `const T&`.
    Ref {
        pointee: Box<CType>,
        is_const: bool,
    },
    /// Fixed-size array: `T[N]`.
    Array {
        element: Box<CType>,
        len: usize,
    },
    Record {
        name: String,
    },
    Enum {
        name: String,
    },
    /// A typedef together with the canonical type clang resolved for it.
    Typedef {
        name: String,
        resolved: Box<CType>,
    },
    /// A function type; function pointers are `Ptr { pointee: FnPtr }`.
    FnPtr {
        return_type: Box<CType>,
        params: Vec<CType>,
        is_variadic: bool,
    },
    /// Anything outside the supported subset (templates, rvalue references,
    /// `long double`, …).
    Unsupported {
        spelling: String,
    },
}

impl CType {
    pub fn ptr(pointee: CType) -> Self {
        CType::Ptr {
            pointee: Box::new(pointee),
            is_const: false,
        }
    }

    pub fn const_ptr(pointee: CType) -> Self {
        CType::Ptr {
            pointee: Box::new(pointee),
            is_const: true,
        }
    }

    pub fn array(element: CType, len: usize) -> Self {
        CType::Array {
            element: Box::new(element),
            len,
        }
    }

    pub fn record(name: &str) -> Self {
        CType::Record {
            name: name.to_string(),
        }
    }

    pub fn typedef(name: &str, resolved: CType) -> Self {
        CType::Typedef {
            name: name.to_string(),
            resolved: Box::new(resolved),
        }
    }

    /// Strips typedefs.
    pub fn canonical(&self) -> &CType {
        match self {
            CType::Typedef { resolved, .. } => resolved.canonical(),
            other => other,
        }
    }

    /// Arithmetic scalars, `bool` and `char`.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            CType::Bool
                | CType::Char
                | CType::I8
                | CType::U8
                | CType::I16
                | CType::U16
                | CType::I32
                | CType::U32
                | CType::I64
                | CType::U64
                | CType::F32
                | CType::F64
                | CType::ISize
                | CType::USize
                | CType::Enum { .. }
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self.canonical(),
            CType::I8
                | CType::U8
                | CType::I16
                | CType::U16
                | CType::I32
                | CType::U32
                | CType::I64
                | CType::U64
                | CType::ISize
                | CType::USize
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self.canonical(), CType::F32 | CType::F64)
    }

    /// Size of a primitive on the LP64/LLP64 targets the generator supports.
    pub fn primitive_size(&self) -> Option<usize> {
        match self {
            CType::Bool | CType::Char | CType::I8 | CType::U8 => Some(1),
            CType::I16 | CType::U16 => Some(2),
            CType::I32 | CType::U32 | CType::F32 => Some(4),
            CType::I64 | CType::U64 | CType::F64 | CType::ISize | CType::USize => Some(8),
            _ => None,
        }
    }

    /// Spelling of a leaf type, or `None` for derived types.
    fn leaf_name(&self) -> Option<&str> {
        Some(match self {
            CType::Void => "void",
            CType::Bool => "bool",
            CType::Char => "char",
            CType::I8 => "int8_t",
            CType::U8 => "uint8_t",
            CType::I16 => "int16_t",
            CType::U16 => "uint16_t",
            CType::I32 => "int32_t",
            CType::U32 => "uint32_t",
            CType::I64 => "int64_t",
            CType::U64 => "uint64_t",
            CType::F32 => "float",
            CType::F64 => "double",
            CType::ISize => "ptrdiff_t",
            CType::USize => "size_t",
            CType::Record { name } | CType::Enum { name } | CType::Typedef { name, .. } => name,
            CType::Unsupported { spelling } => spelling,
            _ => return None,
        })
    }

    /// Renders a C declarator for `ident`, e.g. `const char *label`,
    /// `float col[3]` or `void (*cb)(int32_t)`. An empty `ident` yields the
    /// abstract type name.
    pub fn declare(&self, ident: &str) -> String {
        render(self, ident.to_string(), false)
    }

    /// The abstract type name, e.g. `const ImVec2 *`.
    pub fn spelling(&self) -> String {
        self.declare("")
    }
}

fn render(ty: &CType, inner: String, is_const: bool) -> String {
    let qualifier = if is_const { "const " } else { "" };
    if let Some(leaf) = ty.leaf_name() {
        return if inner.is_empty() {
            format!("{qualifier}{leaf}")
        } else {
            format!("{qualifier}{leaf} {inner}")
        };
    }
    match ty {
        CType::Ptr {
            pointee,
            is_const: pointee_const,
        }
        | CType::Ref {
            pointee,
            is_const: pointee_const,
        } => {
            let sigil = if matches!(ty, CType::Ref { .. }) { "&" } else { "*" };
            let mut declarator = format!("{sigil}{}", if is_const { "const " } else { "" });
            declarator.push_str(&inner);
            if matches!(**pointee, CType::Array { .. } | CType::FnPtr { .. }) {
                declarator = format!("({declarator})");
            }
            render(pointee, declarator, *pointee_const)
        }
        CType::Array { element, len } => render(element, format!("{inner}[{len}]"), is_const),
        CType::FnPtr {
            return_type,
            params,
            is_variadic,
        } => {
            let mut list: Vec<String> = params.iter().map(CType::spelling).collect();
            if *is_variadic {
                list.push("...".to_string());
            }
            if list.is_empty() {
                list.push("void".to_string());
            }
            render(return_type, format!("{inner}({})", list.join(", ")), false)
        }
        _ => unreachable!("leaf types are rendered above"),
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spelling())
    }
}
