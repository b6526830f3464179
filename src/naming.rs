use serde::Deserialize;

use crate::error::{Result, SplitError};

/// What to do with a group name whose normalized form would not be a plain file name.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnsafeNamePolicy {
    #[default]
    Reject,
    Replace,
}

/// Lowercases the name and spells out German umlauts and sharp s.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .replace('ä', "ae")
        .replace('ö', "oe")
        .replace('ü', "ue")
        .replace('ß', "ss")
}

fn is_path_breaking(c: char) -> bool {
    matches!(c, '/' | '\\' | '\0')
}

fn is_reserved_stem(stem: &str) -> bool {
    matches!(stem, "" | "." | "..")
}

/// File stem (without extension) for the output of group `name`.
pub fn output_stem(name: &str, policy: UnsafeNamePolicy) -> Result<String> {
    let normalized = normalize_name(name);
    let stem = match policy {
        UnsafeNamePolicy::Reject if normalized.contains(is_path_breaking) => {
            return Err(SplitError::UnsafeGroupName {
                name: name.to_string(),
                stem: normalized,
            })
        }
        UnsafeNamePolicy::Reject => normalized,
        UnsafeNamePolicy::Replace => normalized
            .chars()
            .map(|c| if is_path_breaking(c) { '_' } else { c })
            .collect(),
    };

    if is_reserved_stem(&stem) {
        return Err(SplitError::UnsafeGroupName {
            name: name.to_string(),
            stem,
        });
    }
    Ok(stem)
}
