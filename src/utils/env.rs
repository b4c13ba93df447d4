// SPDX-License-Identifier: GPL-3.0-only

/// `None` if unset, otherwise whether the value reads as true.
pub fn bool_var(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?.to_lowercase();
    Some(["1", "true", "yes", "y"].contains(&value.as_str()))
}

/// Set and true.
pub fn flag(name: &str) -> bool {
    bool_var(name).unwrap_or(false)
}
