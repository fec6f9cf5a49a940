//! C default-argument expressions → Lua expressions.
//!
//! Only a small expression language is understood: literals, well-known
//! limits, enum constants, `|`, unary minus, `sizeof(T)` and vector
//! constructor calls. Anything else yields `None` and the parameter stays
//! required.

use std::collections::HashMap;

use crate::model::CType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tok<'a> {
    Ident(&'a str),
    Number(&'a str),
    Str(&'a str),
    Punct(char),
}

fn tokenize(src: &str) -> Option<Vec<Tok<'_>>> {
    let bytes = src.as_bytes();
    let mut toks = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            toks.push(Tok::Ident(&src[start..i]));
        } else if c.is_ascii_digit() || (c == '.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            let start = i;
            while i < bytes.len() {
                let b = bytes[i];
                let exponent_sign = (b == b'+' || b == b'-')
                    && matches!(bytes[i - 1], b'e' | b'E')
                    && !src[start..i].starts_with("0x");
                if b.is_ascii_alphanumeric() || b == b'.' || exponent_sign {
                    i += 1;
                } else {
                    break;
                }
            }
            toks.push(Tok::Number(&src[start..i]));
        } else if c == '"' {
            let start = i;
            i += 1;
            while i < bytes.len() && bytes[i] != b'"' {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            if i >= bytes.len() {
                return None;
            }
            i += 1;
            toks.push(Tok::Str(&src[start..i]));
        } else if "()|-,".contains(c) {
            toks.push(Tok::Punct(c));
            i += 1;
        } else {
            return None;
        }
    }
    Some(toks)
}

/// Identifiers mentioned by a default expression.
pub fn identifiers(src: &str) -> Vec<&str> {
    tokenize(src)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|t| match t {
            Tok::Ident(s) => Some(s),
            _ => None,
        })
        .collect()
}

/// Names the translator may refer to.
#[derive(Debug, Default)]
pub struct DefaultScope {
    /// C enum constant → Lua expression.
    pub constants: HashMap<String, String>,
    /// Vector type names with a `M.<name>(...)` constructor.
    pub constructors: Vec<String>,
}

/// Translate `src`, a default argument for a parameter of foreign type
/// `target`.
pub fn translate(src: &str, target: &CType, scope: &DefaultScope) -> Option<String> {
    let toks = tokenize(src)?;
    let mut parser = Parser {
        toks: &toks,
        pos: 0,
        scope,
        pointer_target: matches!(target.canonical(), CType::Ptr { .. }),
    };
    let out = parser.expr()?;
    (parser.pos == toks.len()).then_some(out)
}

struct Parser<'t, 's> {
    toks: &'t [Tok<'t>],
    pos: usize,
    scope: &'s DefaultScope,
    pointer_target: bool,
}

impl<'t> Parser<'t, '_> {
    fn peek(&self) -> Option<Tok<'t>> {
        self.toks.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(Tok::Punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Option<String> {
        let mut terms = vec![self.unary()?];
        while self.eat('|') {
            terms.push(self.unary()?);
        }
        Some(if terms.len() == 1 {
            terms.remove(0)
        } else {
            format!("bit.bor({})", terms.join(", "))
        })
    }

    fn unary(&mut self) -> Option<String> {
        if self.eat('-') {
            let inner = self.unary()?;
            return Some(match inner.strip_prefix('-') {
                Some(pos) => pos.to_string(),
                None => format!("-{inner}"),
            });
        }
        self.primary()
    }

    fn args(&mut self) -> Option<Vec<String>> {
        if !self.eat('(') {
            return None;
        }
        let mut args = Vec::new();
        if self.eat(')') {
            return Some(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(')') {
                return Some(args);
            }
            if !self.eat(',') {
                return None;
            }
        }
    }

    fn primary(&mut self) -> Option<String> {
        let tok = self.peek()?;
        self.pos += 1;
        match tok {
            Tok::Number(n) => {
                let value = number(n)?;
                if self.pointer_target && value == "0" {
                    Some("nil".to_string())
                } else {
                    Some(value)
                }
            }
            Tok::Str(s) => Some(s.to_string()),
            Tok::Punct('(') => {
                let inner = self.expr()?;
                self.eat(')').then(|| format!("({inner})"))
            }
            Tok::Punct(_) => None,
            Tok::Ident(id) => match id {
                "true" | "false" => Some(id.to_string()),
                "nullptr" | "NULL" => Some("nil".to_string()),
                "FLT_MAX" => Some("3.402823466e+38".to_string()),
                "FLT_MIN" => Some("1.175494351e-38".to_string()),
                "DBL_MAX" => Some("1.7976931348623157e+308".to_string()),
                "DBL_MIN" => Some("2.2250738585072014e-308".to_string()),
                "INT_MAX" => Some("2147483647".to_string()),
                "INT_MIN" => Some("-2147483648".to_string()),
                "UINT_MAX" => Some("4294967295".to_string()),
                "sizeof" => {
                    if !self.eat('(') {
                        return None;
                    }
                    let Some(Tok::Ident(ty)) = self.peek() else {
                        return None;
                    };
                    self.pos += 1;
                    self.eat(')').then(|| format!("ffi.sizeof(\"{ty}\")"))
                }
                _ if self.scope.constructors.iter().any(|c| c == id) => {
                    // Components are numbers even when the parameter is a pointer.
                    let pointer_target = std::mem::replace(&mut self.pointer_target, false);
                    let args = self.args();
                    self.pointer_target = pointer_target;
                    Some(format!("M.{id}({})", args?.join(", ")))
                }
                _ => self.scope.constants.get(id).cloned(),
            },
        }
    }
}

/// A C numeric literal as Lua: suffixes dropped.
fn number(lit: &str) -> Option<String> {
    let lower = lit.to_ascii_lowercase();
    let body = if lower.starts_with("0x") {
        lower.trim_end_matches(['u', 'l'])
    } else {
        lower.trim_end_matches(['f', 'u', 'l'])
    };
    if body.is_empty() {
        return None;
    }
    // Octal has no Lua spelling.
    if body.len() > 1 && body.starts_with('0') && body.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> DefaultScope {
        DefaultScope {
            constants: [
                ("Flags_None".to_string(), "M.Flags_None".to_string()),
                ("Flags_A".to_string(), "M.Flags_A".to_string()),
                ("Flags_B".to_string(), "M.Flags_B".to_string()),
            ]
            .into(),
            constructors: vec!["Vec2".into()],
        }
    }

    fn tr(src: &str, target: CType) -> Option<String> {
        translate(src, &target, &scope())
    }

    #[test]
    fn literals() {
        assert_eq!(tr("1.0f", CType::F32).as_deref(), Some("1.0"));
        assert_eq!(tr("-1", CType::I32).as_deref(), Some("-1"));
        assert_eq!(tr("0x1Fu", CType::U32).as_deref(), Some("0x1f"));
        assert_eq!(tr("1e-3f", CType::F32).as_deref(), Some("1e-3"));
        assert_eq!(tr("true", CType::Bool).as_deref(), Some("true"));
        assert_eq!(
            tr("\"%.3f\"", CType::const_ptr(CType::Char)).as_deref(),
            Some("\"%.3f\"")
        );
    }

    #[test]
    fn null_pointers_become_nil() {
        let ptr = CType::ptr(CType::Void);
        assert_eq!(tr("nullptr", ptr.clone()).as_deref(), Some("nil"));
        assert_eq!(tr("NULL", ptr.clone()).as_deref(), Some("nil"));
        assert_eq!(tr("0", ptr).as_deref(), Some("nil"));
        assert_eq!(tr("0", CType::I32).as_deref(), Some("0"));
    }

    #[test]
    fn limits() {
        assert_eq!(tr("FLT_MAX", CType::F32).as_deref(), Some("3.402823466e+38"));
        assert_eq!(tr("-FLT_MIN", CType::F32).as_deref(), Some("-1.175494351e-38"));
    }

    #[test]
    fn enums_and_flags() {
        assert_eq!(tr("Flags_None", CType::I32).as_deref(), Some("M.Flags_None"));
        assert_eq!(
            tr("Flags_A | Flags_B", CType::I32).as_deref(),
            Some("bit.bor(M.Flags_A, M.Flags_B)")
        );
    }

    #[test]
    fn constructors_and_sizeof() {
        let vec2 = CType::record("Vec2");
        assert_eq!(tr("Vec2(0, 0)", vec2.clone()).as_deref(), Some("M.Vec2(0, 0)"));
        assert_eq!(
            tr("Vec2(0, 0)", CType::const_ptr(CType::record("Vec2"))).as_deref(),
            Some("M.Vec2(0, 0)")
        );
        assert_eq!(
            tr("Vec2(-FLT_MIN, 0.0f)", vec2).as_deref(),
            Some("M.Vec2(-1.175494351e-38, 0.0)")
        );
        assert_eq!(
            tr("sizeof(float)", CType::USize).as_deref(),
            Some("ffi.sizeof(\"float\")")
        );
    }

    #[test]
    fn unknown_expressions_are_rejected() {
        assert_eq!(tr("SomeGlobal", CType::I32), None);
        assert_eq!(tr("(ImU32)0", CType::U32), None);
        assert_eq!(tr("a * b", CType::I32), None);
        assert_eq!(tr("010", CType::I32), None);
    }

    #[test]
    fn identifiers_are_listed() {
        assert_eq!(identifiers("Flags_A | Flags_B"), ["Flags_A", "Flags_B"]);
        assert!(identifiers("1.0f").is_empty());
    }
}
