//! Identifier sanitization for target schema names.

use crate::config::FALLBACK_FIELD_NAME;
use std::collections::HashSet;

/// Remove all square brackets from a Tableau name (`[Sales].[Amount]` style).
pub fn strip_brackets(name: &str) -> String {
    name.chars().filter(|c| *c != '[' && *c != ']').collect()
}

/// Sanitize a name for the target schema.
///
/// Brackets are removed and every character that is neither alphanumeric nor
/// `_` becomes `_`. A name that ends up empty becomes `Field`.
pub fn sanitize_name(name: &str) -> String {
    let stripped = strip_brackets(name);
    let sanitized: String = stripped
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if sanitized.is_empty() {
        FALLBACK_FIELD_NAME.to_string()
    } else {
        sanitized
    }
}

/// Hands out unique sanitized names within one scope.
///
/// Uniqueness is case-insensitive because the target model compares object
/// names case-insensitively.
#[derive(Debug, Default)]
pub struct NameAllocator {
    taken: HashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitize `name` and disambiguate it with `_2`, `_3`, ... if taken.
    pub fn allocate(&mut self, name: &str) -> String {
        let base = sanitize_name(name);
        if self.taken.insert(base.to_lowercase()) {
            return base;
        }

        let mut suffix = 2;
        loop {
            let candidate = format!("{}_{}", base, suffix);
            if self.taken.insert(candidate.to_lowercase()) {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Whether a name is already taken.
    pub fn contains(&self, name: &str) -> bool {
        self.taken.contains(&name.to_lowercase())
    }
}
