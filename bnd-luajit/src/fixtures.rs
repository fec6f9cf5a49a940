//! Hand-built translation units for unit tests (no libclang).

use crate::diag::{Diagnostic, DiagnosticKind};
use crate::model::*;

fn decl(name: &str, scope: &[&str], line: u32, kind: DeclKind) -> Declaration {
    Declaration {
        source_name: name.into(),
        scope: scope.iter().map(|s| s.to_string()).collect(),
        location: SourceLocation {
            file: "widgets.h".into(),
            line,
            column: 1,
        },
        doc: None,
        kind,
    }
}

fn function(ret: CType, params: Vec<Parameter>, variadic: bool) -> DeclKind {
    DeclKind::Function(FunctionDecl {
        return_type: ret,
        params,
        is_variadic: variadic,
        method: None,
        usr: None,
    })
}

fn variant(name: &str, value: i64) -> EnumVariant {
    EnumVariant {
        name: name.into(),
        signed_value: value,
        unsigned_value: value as u64,
    }
}

fn field(name: &str, ty: CType) -> FieldDef {
    FieldDef {
        name: name.into(),
        ty,
        bitfield_width: None,
    }
}

/// A small immediate-mode UI header, roughly:
///
/// ```cpp
/// namespace W { enum Dir { Dir_None = -1, Dir_Left, Dir_Right }; }
/// typedef int WidgetFlags;
/// enum WidgetFlags_ { WidgetFlags_None, WidgetFlags_Border, WidgetFlags_Frame };
/// enum Tint : unsigned char { Tint_Min = 0, Tint_Max = 255 };
/// struct Vec2 { float x, y; };
/// struct Style { float alpha; Vec2 padding; WidgetFlags flags; W::Dir dir; unsigned bits : 3;
///                void ScaleAll(float factor); };
/// struct Window { virtual void Draw(); };
/// namespace W {
///   void Foo(float v); void Foo(int a, int b); void Foo(bool b);
///   void Separator();
///   void Text(const char* fmt, ...);
///   void LogAll(...);
///   bool InputText(const char* label, char* buf, size_t buf_size, WidgetFlags flags = 0);
///   void PushItems(ImVector<int>* items);
///   void GetCursor(float* out_x);
///   bool Button(const char* label, const Vec2& size = Vec2(0, 0));
///   bool ColorEdit3(const char* label, float col[3], WidgetFlags flags = WidgetFlags_None);
///   bool SliderFloat(const char* label, float* v, float v_min, float v_max,
///                    const char* format = "%.3f", float power = 1.0f);
///   Window* GetWindow();
///   Style& GetStyle();
///   void PushStyle(Style style);
///   void SetDir(Dir d = Dir_Left);
/// }
/// ```
pub fn widgets_unit() -> TranslationUnit {
    let flags = CType::typedef("WidgetFlags", CType::I32);
    let dir = CType::Enum { name: "Dir".into() };
    let size_t = CType::typedef("size_t", CType::U64);
    let label = || Parameter::new("label", CType::const_ptr(CType::Char));
    let ns = &["W"];

    let mut unit = TranslationUnit::new("widgets.h");
    let mut line = 0;
    let mut push = |name: &str, scope: &[&str], kind: DeclKind| {
        line += 1;
        unit.declarations.push(decl(name, scope, line, kind));
    };

    push(
        "Dir",
        ns,
        DeclKind::Enum(EnumDecl {
            underlying: CType::I32,
            variants: vec![
                variant("Dir_None", -1),
                variant("Dir_Left", 0),
                variant("Dir_Right", 1),
            ],
            is_anonymous: false,
        }),
    );
    push(
        "WidgetFlags",
        &[],
        DeclKind::Typedef(TypedefDecl {
            underlying: CType::I32,
        }),
    );
    push(
        "WidgetFlags_",
        &[],
        DeclKind::Enum(EnumDecl {
            underlying: CType::I32,
            variants: vec![
                variant("WidgetFlags_None", 0),
                variant("WidgetFlags_Border", 1),
                variant("WidgetFlags_Frame", 2),
            ],
            is_anonymous: false,
        }),
    );
    push(
        "Tint",
        &[],
        DeclKind::Enum(EnumDecl {
            underlying: CType::U8,
            variants: vec![variant("Tint_Min", 0), variant("Tint_Max", 255)],
            is_anonymous: false,
        }),
    );
    push(
        "Vec2",
        &[],
        DeclKind::Struct(StructDecl {
            is_union: false,
            is_opaque: false,
            size: 8,
            align: 4,
            fields: vec![field("x", CType::F32), field("y", CType::F32)],
        }),
    );
    push(
        "Style",
        &[],
        DeclKind::Struct(StructDecl {
            is_union: false,
            is_opaque: false,
            size: 24,
            align: 4,
            fields: vec![
                field("alpha", CType::F32),
                field("padding", CType::record("Vec2")),
                field("flags", flags.clone()),
                field("dir", dir.clone()),
                FieldDef {
                    name: "bits".into(),
                    ty: CType::U32,
                    bitfield_width: Some(3),
                },
            ],
        }),
    );
    push(
        "ScaleAll",
        &[],
        DeclKind::Function(FunctionDecl {
            return_type: CType::Void,
            params: vec![Parameter::new("factor", CType::F32)],
            is_variadic: false,
            method: Some(Method {
                record: "Style".into(),
                is_static: false,
                is_const: false,
            }),
            usr: None,
        }),
    );

    push("Foo", ns, function(CType::Void, vec![Parameter::new("v", CType::F32)], false));
    push(
        "Foo",
        ns,
        function(
            CType::Void,
            vec![Parameter::new("a", CType::I32), Parameter::new("b", CType::I32)],
            false,
        ),
    );
    push("Foo", ns, function(CType::Void, vec![Parameter::new("b", CType::Bool)], false));
    push("Separator", ns, function(CType::Void, vec![], false));
    push(
        "Text",
        ns,
        function(
            CType::Void,
            vec![Parameter::new("fmt", CType::const_ptr(CType::Char))],
            true,
        ),
    );
    push("LogAll", ns, function(CType::Void, vec![], true));
    push(
        "InputText",
        ns,
        function(
            CType::Bool,
            vec![
                label(),
                Parameter::new("buf", CType::ptr(CType::Char)),
                Parameter::new("buf_size", size_t),
                Parameter::new("flags", flags.clone()).with_default(Some("0".into())),
            ],
            false,
        ),
    );
    push(
        "PushItems",
        ns,
        function(
            CType::Void,
            vec![Parameter::new(
                "items",
                CType::ptr(CType::Unsupported {
                    spelling: "ImVector<int>".into(),
                }),
            )],
            false,
        ),
    );
    push(
        "GetCursor",
        ns,
        function(
            CType::Void,
            vec![Parameter::new("out_x", CType::ptr(CType::F32))],
            false,
        ),
    );
    push(
        "Button",
        ns,
        function(
            CType::Bool,
            vec![
                label(),
                Parameter::new(
                    "size",
                    CType::Ref {
                        pointee: Box::new(CType::record("Vec2")),
                        is_const: true,
                    },
                )
                .with_default(Some("Vec2(0, 0)".into())),
            ],
            false,
        ),
    );
    push(
        "ColorEdit3",
        ns,
        function(
            CType::Bool,
            vec![
                label(),
                Parameter::new("col", CType::array(CType::F32, 3)),
                Parameter::new("flags", flags)
                    .with_default(Some("WidgetFlags_None".into())),
            ],
            false,
        ),
    );
    push(
        "SliderFloat",
        ns,
        function(
            CType::Bool,
            vec![
                label(),
                Parameter::new("v", CType::ptr(CType::F32)),
                Parameter::new("v_min", CType::F32),
                Parameter::new("v_max", CType::F32),
                Parameter::new("format", CType::const_ptr(CType::Char))
                    .with_default(Some("\"%.3f\"".into())),
                Parameter::new("power", CType::F32).with_default(Some("1.0f".into())),
            ],
            false,
        ),
    );
    push(
        "GetWindow",
        ns,
        function(CType::ptr(CType::record("Window")), vec![], false),
    );
    push(
        "GetStyle",
        ns,
        function(
            CType::Ref {
                pointee: Box::new(CType::record("Style")),
                is_const: false,
            },
            vec![],
            false,
        ),
    );
    push(
        "PushStyle",
        ns,
        function(
            CType::Void,
            vec![Parameter::new("style", CType::record("Style"))],
            false,
        ),
    );
    push(
        "SetDir",
        ns,
        function(
            CType::Void,
            vec![Parameter::new("d", dir).with_default(Some("Dir_Left".into()))],
            false,
        ),
    );

    unit.diagnostics.push(Diagnostic::new(
        "Window",
        None,
        DiagnosticKind::RejectedStruct {
            reason: "virtual method `Draw`".into(),
        },
    ));
    unit
}

/// [`widgets_unit`] plus declarations whose Lua names clash with it:
///
/// ```cpp
/// typedef float Float;
/// void SetFloat(Float* v);
/// enum Clash { Separator = 7 };
/// ```
pub fn clashing_unit() -> TranslationUnit {
    let mut unit = widgets_unit();
    let line = unit.declarations.len() as u32;
    unit.declarations.push(decl(
        "Float",
        &[],
        line + 1,
        DeclKind::Typedef(TypedefDecl {
            underlying: CType::F32,
        }),
    ));
    unit.declarations.push(decl(
        "SetFloat",
        &["W"],
        line + 2,
        function(
            CType::Void,
            vec![Parameter::new(
                "v",
                CType::ptr(CType::typedef("Float", CType::F32)),
            )],
            false,
        ),
    ));
    unit.declarations.push(decl(
        "Clash",
        &[],
        line + 3,
        DeclKind::Enum(EnumDecl {
            underlying: CType::I32,
            variants: vec![variant("Separator", 7)],
            is_anonymous: false,
        }),
    ));
    unit
}

/// Functions whose integer pointers the header spells as `long`/`long long`:
///
/// ```cpp
/// void Accumulate(long long* total, const long& step, int count);
/// unsigned long long* Counter();
/// void Fill(long long v[4]);
/// ```
pub fn wide_integers_unit() -> TranslationUnit {
    let mut unit = TranslationUnit::new("numbers.h");
    let spelled = |name: &str, ty: CType, spelling: &str| {
        Parameter::new(name, ty).with_native_spelling(Some(spelling.into()))
    };
    unit.declarations.push(decl(
        "Accumulate",
        &[],
        1,
        function(
            CType::Void,
            vec![
                spelled("total", CType::ptr(CType::I64), "long long *"),
                spelled(
                    "step",
                    CType::Ref {
                        pointee: Box::new(CType::I64),
                        is_const: true,
                    },
                    "const long &",
                ),
                spelled("count", CType::I32, "int"),
            ],
            false,
        ),
    ));
    unit.declarations.push(decl(
        "Counter",
        &[],
        2,
        function(CType::ptr(CType::U64), vec![], false),
    ));
    unit.declarations.push(decl(
        "Fill",
        &[],
        3,
        function(
            CType::Void,
            vec![spelled("v", CType::array(CType::I64, 4), "long long[4]")],
            false,
        ),
    ));
    unit
}
