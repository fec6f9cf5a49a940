//! Type mapping: native [`CType`] → foreign type descriptor + passing strategy.
//!
//! Mappings are built lazily and memoized per distinct native type, so every
//! struct is validated and laid out exactly once no matter how many
//! declarations reference it.

use std::collections::HashMap;

use tracing::trace;

use crate::model::*;

/// How a value crosses the foreign-call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassingStrategy {
    Value,
    Pointer,
    FixedArray,
    StringBuffer,
}

impl PassingStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            PassingStrategy::Value => "value",
            PassingStrategy::Pointer => "pointer",
            PassingStrategy::FixedArray => "fixed_array",
            PassingStrategy::StringBuffer => "string_buffer",
        }
    }
}

/// How a vector-like value type stores its components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBacking {
    /// A POD struct of 2–4 float fields (`ImVec2`).
    Struct,
    /// A bare `float[N]`, wrapped in a generated `FloatN` struct.
    Array,
}

/// Shape of a vector-like type; drives value-type generation in the wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorShape {
    pub type_name: String,
    /// `F32` or `F64`.
    pub element: CType,
    pub components: Vec<String>,
    pub backing: VectorBacking,
}

impl VectorShape {
    pub fn arity(&self) -> usize {
        self.components.len()
    }

    fn for_array(element: &CType, len: usize) -> Option<Self> {
        if !(2..=4).contains(&len) {
            return None;
        }
        let prefix = match element.canonical() {
            CType::F32 => "Float",
            CType::F64 => "Double",
            _ => return None,
        };
        Some(VectorShape {
            type_name: format!("{prefix}{len}"),
            element: element.canonical().clone(),
            components: ["x", "y", "z", "w"][..len].iter().map(|c| c.to_string()).collect(),
            backing: VectorBacking::Array,
        })
    }

    fn for_struct(name: &str, decl: &StructDecl) -> Option<Self> {
        if decl.is_union || decl.is_opaque || !(2..=4).contains(&decl.fields.len()) {
            return None;
        }
        let element = decl.fields[0].ty.canonical();
        if !element.is_float() {
            return None;
        }
        let uniform = decl
            .fields
            .iter()
            .all(|f| f.bitfield_width.is_none() && f.ty.canonical() == element);
        if !uniform {
            return None;
        }
        Some(VectorShape {
            type_name: name.to_string(),
            element: element.clone(),
            components: decl.fields.iter().map(|f| f.name.clone()).collect(),
            backing: VectorBacking::Struct,
        })
    }
}

/// The mapping for one distinct native type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeMapping {
    pub native: CType,
    /// Foreign descriptor: a [`CType`] restricted to what `ffi.cdef` accepts:
    /// no references, no unsupported leaves, typedef names only when the
    /// typedef is declared by the header.
    pub foreign: CType,
    pub strategy: PassingStrategy,
    pub size: Option<usize>,
    pub align: Option<usize>,
    pub vector: Option<VectorShape>,
    /// The native side takes a reference; the host shim dereferences.
    pub by_reference: bool,
}

impl TypeMapping {
    fn value(native: &CType, foreign: CType) -> Self {
        let size = foreign.primitive_size();
        Self {
            native: native.clone(),
            foreign,
            strategy: PassingStrategy::Value,
            size,
            align: size,
            vector: None,
            by_reference: false,
        }
    }

    /// True when the callee may write through this parameter.
    pub fn is_writable(&self) -> bool {
        match &self.foreign {
            CType::Ptr { is_const, .. } => !is_const && self.strategy == PassingStrategy::Pointer,
            CType::Array { .. } => true,
            _ => false,
        }
    }

    /// The pointee of a pointer mapping.
    pub fn pointee(&self) -> Option<&CType> {
        match &self.foreign {
            CType::Ptr { pointee, .. } => Some(pointee),
            _ => None,
        }
    }
}

/// Index of a mapping inside a [`TypeMapper`]'s table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MappingId(usize);

/// Why a native type could not be mapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsupported {
    pub ty: String,
    pub reason: String,
}

impl Unsupported {
    fn new(ty: &CType, reason: impl Into<String>) -> Self {
        Self {
            ty: ty.spelling(),
            reason: reason.into(),
        }
    }
}

/// Name lookup over the declarations of one translation unit.
#[derive(Debug)]
pub struct TypeIndex<'a> {
    structs: HashMap<&'a str, &'a StructDecl>,
    enums: HashMap<&'a str, &'a EnumDecl>,
    typedefs: HashMap<&'a str, &'a TypedefDecl>,
}

impl<'a> TypeIndex<'a> {
    pub fn new(unit: &'a TranslationUnit) -> Self {
        let mut index = TypeIndex {
            structs: HashMap::new(),
            enums: HashMap::new(),
            typedefs: HashMap::new(),
        };
        for decl in &unit.declarations {
            let name = decl.source_name.as_str();
            match &decl.kind {
                DeclKind::Struct(s) => {
                    // A definition wins over an earlier forward declaration.
                    let replace = index.structs.get(name).is_none_or(|prev| prev.is_opaque);
                    if replace {
                        index.structs.insert(name, s);
                    }
                }
                DeclKind::Enum(e) if !e.is_anonymous => {
                    index.enums.insert(name, e);
                }
                DeclKind::Typedef(t) => {
                    index.typedefs.entry(name).or_insert(t);
                }
                _ => {}
            }
        }
        index
    }

    pub fn find_struct(&self, name: &str) -> Option<&'a StructDecl> {
        self.structs.get(name).copied()
    }

    pub fn find_enum(&self, name: &str) -> Option<&'a EnumDecl> {
        self.enums.get(name).copied()
    }

    pub fn find_typedef(&self, name: &str) -> Option<&'a TypedefDecl> {
        self.typedefs.get(name).copied()
    }

    /// Structural foreign spelling of a native type, without validation.
    /// Used for struct fields, which [`TypeMapper`] has already checked.
    pub fn foreign_type(&self, ty: &CType) -> CType {
        match ty {
            CType::Ptr { pointee, is_const } | CType::Ref { pointee, is_const } => CType::Ptr {
                pointee: Box::new(self.foreign_type(pointee)),
                is_const: *is_const,
            },
            CType::Array { element, len } => CType::array(self.foreign_type(element), *len),
            CType::Typedef { name, resolved } => {
                let inner = self.foreign_type(resolved);
                if self.find_typedef(name).is_some() {
                    CType::typedef(name, inner)
                } else {
                    inner
                }
            }
            CType::Enum { name } => match self.find_enum(name) {
                Some(e) => CType::typedef(name, e.underlying.canonical().clone()),
                None => CType::I32,
            },
            CType::FnPtr {
                return_type,
                params,
                is_variadic,
            } => CType::FnPtr {
                return_type: Box::new(self.foreign_type(return_type)),
                params: params.iter().map(|p| self.foreign_type(p)).collect(),
                is_variadic: *is_variadic,
            },
            other => other.clone(),
        }
    }
}

/// Lazily built, memoized `CType → TypeMapping` table.
pub struct TypeMapper<'a> {
    unit: &'a TranslationUnit,
    index: TypeIndex<'a>,
    table: Vec<TypeMapping>,
    memo: HashMap<CType, Result<MappingId, Unsupported>>,
}

impl<'a> TypeMapper<'a> {
    pub fn new(unit: &'a TranslationUnit) -> Self {
        Self {
            unit,
            index: TypeIndex::new(unit),
            table: Vec::new(),
            memo: HashMap::new(),
        }
    }

    pub fn index(&self) -> &TypeIndex<'a> {
        &self.index
    }

    /// Map a native type, reusing an earlier result for the same type.
    pub fn map(&mut self, ty: &CType) -> Result<MappingId, Unsupported> {
        if let Some(done) = self.memo.get(ty) {
            return done.clone();
        }
        let result = self.build(ty).map(|mapping| {
            trace!(native = %ty, strategy = mapping.strategy.as_str(), "mapped type");
            self.table.push(mapping);
            MappingId(self.table.len() - 1)
        });
        self.memo.insert(ty.clone(), result.clone());
        result
    }

    pub fn get(&self, id: MappingId) -> &TypeMapping {
        &self.table[id.0]
    }

    /// A previously computed mapping, without building a new one.
    pub fn lookup(&self, ty: &CType) -> Option<&TypeMapping> {
        match self.memo.get(ty) {
            Some(Ok(id)) => Some(self.get(*id)),
            _ => None,
        }
    }

    /// Number of distinct native types mapped so far.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Vector shape of a struct accepted by the extractor, if it is vector-like.
    pub fn struct_vector_shape(&self, name: &str) -> Option<VectorShape> {
        self.index
            .find_struct(name)
            .and_then(|s| VectorShape::for_struct(name, s))
    }

    fn build(&mut self, ty: &CType) -> Result<TypeMapping, Unsupported> {
        match ty {
            CType::Void
            | CType::Bool
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
            | CType::USize => Ok(TypeMapping::value(ty, ty.clone())),

            CType::Unsupported { .. } => Err(Unsupported::new(ty, "no mapping rule")),

            CType::Enum { name } => {
                // Enums cross as their declared underlying integer, under a
                // typedef that carries the enum's name.
                let Some(decl) = self.index.find_enum(name) else {
                    return Ok(TypeMapping::value(ty, CType::I32));
                };
                let underlying = decl.underlying.canonical().clone();
                let mut mapping = TypeMapping::value(ty, CType::typedef(name, underlying.clone()));
                mapping.size = underlying.primitive_size();
                mapping.align = mapping.size;
                Ok(mapping)
            }

            CType::Typedef { name, resolved } => {
                let inner_id = self.map(resolved)?;
                let inner = self.get(inner_id).clone();
                if self.index.find_typedef(name).is_none() {
                    // System typedef (size_t, uint32_t, …): cross as the
                    // canonical type clang resolved.
                    return Ok(TypeMapping {
                        native: ty.clone(),
                        ..inner
                    });
                }
                let strategy = match inner.strategy {
                    PassingStrategy::FixedArray => PassingStrategy::FixedArray,
                    _ => PassingStrategy::Value,
                };
                Ok(TypeMapping {
                    native: ty.clone(),
                    foreign: CType::typedef(name, inner.foreign),
                    strategy,
                    size: inner.size,
                    align: inner.align,
                    vector: inner.vector,
                    by_reference: false,
                })
            }

            CType::Record { name } => self.map_record_by_value(ty, name),

            CType::Ptr { pointee, is_const } => self.map_pointer(ty, pointee, *is_const),

            CType::Ref { pointee, is_const } => {
                let mut mapping = self.map_pointer(ty, pointee, *is_const)?;
                mapping.by_reference = true;
                Ok(mapping)
            }

            CType::Array { element, len } => {
                let inner_id = self.map(element)?;
                let inner = self.get(inner_id).clone();
                if inner.strategy == PassingStrategy::Value && matches!(inner.foreign, CType::Void) {
                    return Err(Unsupported::new(ty, "array of void"));
                }
                Ok(TypeMapping {
                    native: ty.clone(),
                    foreign: CType::array(inner.foreign, *len),
                    strategy: PassingStrategy::FixedArray,
                    size: inner.size.map(|s| s * len),
                    align: inner.align,
                    vector: VectorShape::for_array(element, *len),
                    by_reference: false,
                })
            }

            // A bare function type only appears where C decays it to a pointer.
            CType::FnPtr { .. } => {
                let ptr = CType::ptr(ty.clone());
                let id = self.map(&ptr)?;
                Ok(TypeMapping {
                    native: ty.clone(),
                    ..self.get(id).clone()
                })
            }
        }
    }

    fn map_record_by_value(&mut self, ty: &CType, name: &str) -> Result<TypeMapping, Unsupported> {
        let Some(decl) = self.index.find_struct(name) else {
            let reason = if self.unit.is_rejected(name) {
                format!("struct `{name}` was rejected")
            } else {
                format!("struct `{name}` is not declared in the header")
            };
            return Err(Unsupported::new(ty, reason));
        };
        if decl.is_opaque {
            return Err(Unsupported::new(
                ty,
                format!("incomplete type `{name}` passed by value"),
            ));
        }
        for field in &decl.fields {
            if let Err(e) = self.map(&field.ty) {
                return Err(Unsupported::new(
                    ty,
                    format!("field `{}`: {} ({})", field.name, e.ty, e.reason),
                ));
            }
        }
        Ok(TypeMapping {
            native: ty.clone(),
            foreign: ty.clone(),
            strategy: PassingStrategy::Value,
            size: Some(decl.size),
            align: Some(decl.align),
            vector: VectorShape::for_struct(name, decl),
            by_reference: false,
        })
    }

    fn map_pointer(
        &mut self,
        ty: &CType,
        pointee: &CType,
        is_const: bool,
    ) -> Result<TypeMapping, Unsupported> {
        let pointer = |foreign_pointee: CType| CType::Ptr {
            pointee: Box::new(foreign_pointee),
            is_const,
        };
        match pointee.canonical() {
            CType::FnPtr {
                return_type,
                params,
                is_variadic,
            } => {
                let ret = self.map(return_type)?;
                let ret = self.get(ret).foreign.clone();
                let mut foreign_params = Vec::with_capacity(params.len());
                for p in params {
                    let id = self.map(p)?;
                    foreign_params.push(self.get(id).foreign.clone());
                }
                let callback = CType::FnPtr {
                    return_type: Box::new(ret),
                    params: foreign_params,
                    is_variadic: *is_variadic,
                };
                Ok(TypeMapping::value(ty, CType::ptr(callback)))
            }
            // `const char*` is a string input; `void*` an opaque handle.
            CType::Char if is_const => Ok(TypeMapping::value(ty, pointer(CType::Char))),
            CType::Void => Ok(TypeMapping::value(ty, pointer(CType::Void))),
            CType::Record { name } => {
                // Any record may be referenced through a pointer; undefined
                // or rejected ones become opaque handles.
                let foreign_pointee = match pointee {
                    CType::Typedef { name: alias, .. } if self.index.find_typedef(alias).is_some() => {
                        pointee.clone()
                    }
                    _ => CType::record(name),
                };
                Ok(TypeMapping {
                    native: ty.clone(),
                    foreign: pointer(foreign_pointee),
                    strategy: PassingStrategy::Pointer,
                    size: None,
                    align: None,
                    vector: self.struct_vector_shape(name),
                    by_reference: false,
                })
            }
            _ => {
                let inner_id = self.map(pointee)?;
                let inner = self.get(inner_id).clone();
                let vector = match &inner.foreign {
                    CType::Record { name } => self.struct_vector_shape(name),
                    _ => None,
                };
                Ok(TypeMapping {
                    native: ty.clone(),
                    foreign: pointer(inner.foreign),
                    strategy: PassingStrategy::Pointer,
                    size: None,
                    align: None,
                    vector,
                    by_reference: false,
                })
            }
        }
    }
}
