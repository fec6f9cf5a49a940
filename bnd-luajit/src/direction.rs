//! Output-parameter detection.
//!
//! Whether a pointer parameter is written by the callee is not visible in a
//! C signature. Each [`DirectionPolicy`] gives an opinion; [`PolicyChain`]
//! combines them and rejects disagreement.

use crate::config::ParamConfig;
use crate::model::{Declaration, Direction, Parameter};

/// One source of parameter-direction knowledge.
pub trait DirectionPolicy {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// `None` when the policy has no opinion about `param`.
    fn classify(&self, decl: &Declaration, param: &Parameter) -> Option<Direction>;
}

/// Explicit verdicts keyed by `Function.param`.
pub struct AllowList {
    entries: Vec<(String, Direction)>,
}

impl AllowList {
    pub fn new(entries: impl IntoIterator<Item = (String, Direction)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

impl DirectionPolicy for AllowList {
    fn name(&self) -> &'static str {
        "allow-list"
    }

    fn classify(&self, decl: &Declaration, param: &Parameter) -> Option<Direction> {
        let key = format!("{}.{}", decl.flat_name(), param.name);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, d)| *d)
    }
}

/// `out_value` style prefixes.
pub struct NamingConvention {
    prefixes: Vec<String>,
}

impl NamingConvention {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }
}

impl DirectionPolicy for NamingConvention {
    fn name(&self) -> &'static str {
        "naming convention"
    }

    fn classify(&self, _decl: &Declaration, param: &Parameter) -> Option<Direction> {
        self.prefixes
            .iter()
            .any(|p| !p.is_empty() && param.name.starts_with(p.as_str()))
            .then_some(Direction::Out)
    }
}

/// Doxygen `@param[out] name` / `\param[in,out] name`.
pub struct DocComment;

impl DirectionPolicy for DocComment {
    fn name(&self) -> &'static str {
        "doc comment"
    }

    fn classify(&self, decl: &Declaration, param: &Parameter) -> Option<Direction> {
        let doc = decl.doc.as_deref()?;
        for marker in ["@param[", "\\param["] {
            let mut rest = doc;
            while let Some(start) = rest.find(marker) {
                rest = &rest[start + marker.len()..];
                let Some(close) = rest.find(']') else {
                    break;
                };
                let attr: String = rest[..close].chars().filter(|c| !c.is_whitespace()).collect();
                let name = rest[close + 1..]
                    .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .find(|s| !s.is_empty());
                if name == Some(param.name.as_str()) {
                    return match attr.as_str() {
                        "out" => Some(Direction::Out),
                        "in,out" | "inout" => Some(Direction::InOut),
                        "in" => Some(Direction::In),
                        _ => None,
                    };
                }
            }
        }
        None
    }
}

/// Ordered set of policies that vote on each parameter.
pub struct PolicyChain {
    policies: Vec<Box<dyn DirectionPolicy>>,
}

impl PolicyChain {
    pub fn new(policies: Vec<Box<dyn DirectionPolicy>>) -> Self {
        Self { policies }
    }

    pub fn from_config(cfg: &ParamConfig) -> Self {
        let mut policies: Vec<Box<dyn DirectionPolicy>> = vec![
            Box::new(AllowList::new(
                cfg.directions.iter().map(|(k, v)| (k.clone(), *v)),
            )),
            Box::new(NamingConvention::new(cfg.out_prefixes.clone())),
        ];
        if cfg.doc_comments {
            policies.push(Box::new(DocComment));
        }
        Self::new(policies)
    }

    /// Resolve the direction of `param`.
    ///
    /// `writable` tells whether the callee can write through the parameter's
    /// mapped type. Returns the reason as `Err` when the verdict is ambiguous.
    pub fn resolve(
        &self,
        decl: &Declaration,
        param: &Parameter,
        writable: bool,
    ) -> Result<Direction, String> {
        let mut verdict: Option<(Direction, &'static str)> = None;
        for policy in &self.policies {
            let Some(dir) = policy.classify(decl, param) else {
                continue;
            };
            match verdict {
                Some((prev, by)) if prev != dir => {
                    return Err(format!(
                        "{by} says `{}`, {} says `{}`",
                        prev.as_str(),
                        policy.name(),
                        dir.as_str()
                    ));
                }
                Some(_) => {}
                None => verdict = Some((dir, policy.name())),
            }
        }
        match verdict {
            Some((Direction::In, _)) => Ok(Direction::In),
            Some((dir, _)) if writable => Ok(dir),
            Some((dir, by)) => Err(format!(
                "{by} says `{}` but the parameter cannot be written through",
                dir.as_str()
            )),
            None => Ok(if writable { param.direction } else { Direction::In }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    fn decl(doc: Option<&str>) -> Declaration {
        Declaration {
            source_name: "GetPos".into(),
            scope: vec![],
            location: SourceLocation::default(),
            doc: doc.map(str::to_string),
            kind: DeclKind::Function(FunctionDecl {
                return_type: CType::Void,
                params: vec![],
                is_variadic: false,
                method: None,
                usr: None,
            }),
        }
    }

    fn chain() -> PolicyChain {
        PolicyChain::from_config(&ParamConfig {
            directions: [("GetPos.y".to_string(), Direction::In)].into(),
            ..ParamConfig::default()
        })
    }

    #[test]
    fn no_verdict_keeps_syntactic_direction() {
        let p = Parameter::new("x", CType::ptr(CType::F32));
        assert_eq!(chain().resolve(&decl(None), &p, true), Ok(Direction::InOut));
        let s = Parameter::new("label", CType::const_ptr(CType::Char));
        assert_eq!(chain().resolve(&decl(None), &s, false), Ok(Direction::In));
    }

    #[test]
    fn naming_prefix_marks_out() {
        let p = Parameter::new("out_x", CType::ptr(CType::F32));
        assert_eq!(chain().resolve(&decl(None), &p, true), Ok(Direction::Out));
    }

    #[test]
    fn doc_comment_marks_out_and_inout() {
        let d = decl(Some("/// @param[out] x horizontal\n/// \\param[in, out] z depth"));
        let x = Parameter::new("x", CType::ptr(CType::F32));
        let z = Parameter::new("z", CType::ptr(CType::F32));
        assert_eq!(chain().resolve(&d, &x, true), Ok(Direction::Out));
        assert_eq!(chain().resolve(&d, &z, true), Ok(Direction::InOut));
    }

    #[test]
    fn disagreement_is_ambiguous() {
        let d = decl(Some("@param[out] out_y"));
        let agree = Parameter::new("out_y", CType::ptr(CType::F32));
        assert_eq!(chain().resolve(&d, &agree, true), Ok(Direction::Out));

        // allow-list says `in`, doc comment says `out`.
        let d = decl(Some("@param[out] y"));
        let y = Parameter::new("y", CType::ptr(CType::F32));
        let err = chain().resolve(&d, &y, true).unwrap_err();
        assert!(err.contains("allow-list"), "{err}");
    }

    #[test]
    fn out_on_value_parameter_is_ambiguous() {
        let p = Parameter::new("out_count", CType::I32);
        assert!(chain().resolve(&decl(None), &p, false).is_err());
    }
}
