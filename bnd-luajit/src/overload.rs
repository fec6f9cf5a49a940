//! Overload resolution: give every function a unique flat name.
//!
//! The first declaration of a name keeps it; the Nth (N ≥ 2) becomes
//! `nameN`, counted in source order. Ordinals are assigned over every
//! extracted function, before anything is excluded, so dropping one
//! overload never renames another.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Result, bail};
use tracing::debug;

use crate::diag::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::model::TranslationUnit;

/// Functions sharing one flat source name, in first-appearance order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverloadGroup {
    pub source_name: String,
    /// Indices into `TranslationUnit::declarations`.
    pub members: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct OverloadTable {
    pub groups: Vec<OverloadGroup>,
    names: HashMap<usize, String>,
}

impl OverloadTable {
    /// Emitted name of the function at `decl_index`.
    pub fn emitted_name(&self, decl_index: usize) -> Option<&str> {
        self.names.get(&decl_index).map(String::as_str)
    }
}

/// Name of the `ordinal`-th (1-based) overload of `source_name`.
pub fn ordinal_name(source_name: &str, ordinal: usize) -> String {
    if ordinal <= 1 {
        source_name.to_string()
    } else {
        format!("{source_name}{ordinal}")
    }
}

/// Group the unit's functions and assign emitted names.
///
/// Identical signatures within a group are reported but keep their ordinal.
/// Fails if two functions would be emitted under the same name.
pub fn resolve(unit: &TranslationUnit, diagnostics: &mut Diagnostics) -> Result<OverloadTable> {
    let mut groups: Vec<OverloadGroup> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (idx, decl, _) in unit.functions() {
        let flat = decl.flat_name();
        match by_name.get(&flat) {
            Some(&g) => groups[g].members.push(idx),
            None => {
                by_name.insert(flat.clone(), groups.len());
                groups.push(OverloadGroup {
                    source_name: flat,
                    members: vec![idx],
                });
            }
        }
    }

    let mut table = OverloadTable::default();
    let mut owners: BTreeMap<String, usize> = BTreeMap::new();
    for group in &groups {
        for (i, &idx) in group.members.iter().enumerate() {
            let name = ordinal_name(&group.source_name, i + 1);
            if let Some(&other) = owners.get(&name) {
                bail!(
                    "emitted name `{name}` is claimed by both `{}` (line {}) and `{}` (line {})",
                    unit.declarations[other].flat_name(),
                    unit.declarations[other].location.line,
                    unit.declarations[idx].flat_name(),
                    unit.declarations[idx].location.line,
                );
            }
            owners.insert(name.clone(), idx);

            let decl = &unit.declarations[idx];
            if let Some(sig) = decl.as_function().map(|f| f.signature()) {
                let previous = group.members[..i].iter().position(|&p| {
                    unit.declarations[p].as_function().map(|f| f.signature()) == Some(sig.clone())
                });
                if let Some(p) = previous {
                    diagnostics.push(Diagnostic::new(
                        group.source_name.clone(),
                        Some(decl.location.clone()),
                        DiagnosticKind::DuplicateSignature {
                            emitted_name: name.clone(),
                            previous: ordinal_name(&group.source_name, p + 1),
                        },
                    ));
                }
            }
            if group.members.len() > 1 {
                debug!(source = %group.source_name, emitted = %name, "assigned overload name");
            }
            table.names.insert(idx, name);
        }
    }
    table.groups = groups;
    Ok(table)
}
