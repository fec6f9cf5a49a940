//! Recoverable, per-declaration diagnostics.
//!
//! A diagnostic never aborts the pipeline: the offending declaration is left
//! out of every artifact and the run continues. The collected list is
//! reported once, after generation.

use thiserror::Error;

use crate::model::SourceLocation;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}`{subject}` {kind}", location_prefix(.location))]
pub struct Diagnostic {
    /// Source name of the declaration the diagnostic is about.
    pub subject: String,
    pub location: Option<SourceLocation>,
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagnosticKind {
    /// A parameter or return type has no mapping rule.
    #[error("skipped: unsupported type `{ty}` in {position} ({reason})")]
    UnsupportedType {
        ty: String,
        position: String,
        reason: String,
    },
    /// A struct is not plain-old-data.
    #[error("skipped: struct is not plain-old-data ({reason})")]
    RejectedStruct { reason: String },
    /// The output-parameter policies disagree, or mark a parameter that
    /// cannot be written through.
    #[error("skipped: direction of parameter `{param}` is ambiguous ({reason})")]
    AmbiguousDirection { param: String, reason: String },
    /// Two overloads with identical parameter lists.
    #[error("emitted as `{emitted_name}` has the same signature as `{previous}`")]
    DuplicateSignature { emitted_name: String, previous: String },
    /// A variadic function with no named parameter to anchor `va_start`.
    #[error("skipped: variadic function without a named parameter")]
    UnsupportedVariadic,
    /// A generated Lua name is already taken by another declaration.
    #[error("skipped: Lua name `{name}` is already used by `{owner}`")]
    NameCollision { name: String, owner: String },
}

fn location_prefix(location: &Option<SourceLocation>) -> String {
    location.as_ref().map(|l| format!("{l}: ")).unwrap_or_default()
}

impl Diagnostic {
    pub fn new(
        subject: impl Into<String>,
        location: Option<SourceLocation>,
        kind: DiagnosticKind,
    ) -> Self {
        Self {
            subject: subject.into(),
            location,
            kind,
        }
    }

    /// Whether the subject was left out of the generated artifacts.
    pub fn excludes(&self) -> bool {
        !matches!(self.kind, DiagnosticKind::DuplicateSignature { .. })
    }
}

/// Ordered collection of diagnostics for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.items.extend(diagnostics);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Diagnostics whose subject is `name`.
    pub fn about<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.items.iter().filter(move |d| d.subject == name)
    }

    /// Human-readable end-of-run report.
    pub fn summary(&self) -> String {
        if self.items.is_empty() {
            return "no diagnostics".to_string();
        }
        let excluded = self.items.iter().filter(|d| d.excludes()).count();
        let mut out = format!(
            "{} diagnostic(s), {} declaration(s) excluded:",
            self.items.len(),
            excluded
        );
        for d in &self.items {
            out.push_str("\n  • ");
            out.push_str(&d.to_string());
        }
        out
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
