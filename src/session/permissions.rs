use crate::common::SessionError;
use std::collections::BTreeSet;

/// An empty code gates nothing
pub fn has_perm(perms: &BTreeSet<String>, code: &str) -> bool {
    code.is_empty() || perms.contains(code)
}

pub fn require_perm(perms: &BTreeSet<String>, code: &str) -> Result<(), SessionError> {
    if has_perm(perms, code) {
        Ok(())
    } else {
        Err(SessionError::PermissionDenied(code.to_string()))
    }
}

/// Permission codes out of a `/permissions` payload.
/// Accepts `["a","b"]` or `[{"code":"a"}, ...]`; anything else is None.
pub fn parse_codes(data: &serde_json::Value) -> Option<BTreeSet<String>> {
    let items = data.as_array()?;
    let mut codes = BTreeSet::new();
    for item in items {
        let code = item
            .as_str()
            .or_else(|| item.get("code").and_then(|c| c.as_str()))?;
        codes.insert(code.to_string());
    }
    Some(codes)
}
