//! Prim path and identifier helpers.
//!
//! Prim paths are plain absolute strings (`/Asset/Materials/body`). The
//! pseudo-root is `/`. Property paths (`/Mat/Shader.outputs:rgb`) only appear
//! as connection targets and are never traversed.

/// Path of the pseudo-root prim.
pub const ROOT: &str = "/";

/// Check whether `name` is a valid prim name.
///
/// A valid identifier starts with an ASCII letter or underscore and continues
/// with ASCII letters, digits or underscores.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Turn an arbitrary string into a valid identifier.
///
/// Invalid characters become `_`, and a leading digit gets a `_` prefix.
pub fn make_valid_identifier(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }

    let mut result: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }
    result
}

/// Append a child name to a prim path.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() || parent == ROOT {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// The parent of a prim path (`/` for top-level prims).
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => ROOT,
        Some(idx) => &path[..idx],
    }
}

/// The last segment of a prim path.
pub fn name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

/// Iterate over the non-empty segments of a prim path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Check whether `path` is an absolute prim path made of valid identifiers.
pub fn is_valid_prim_path(path: &str) -> bool {
    if !path.starts_with('/') {
        return false;
    }
    if path == ROOT {
        return true;
    }
    let mut count = 0;
    for segment in path[1..].split('/') {
        if !is_valid_identifier(segment) {
            return false;
        }
        count += 1;
    }
    count > 0
}

/// Strip a property suffix (`.outputs:rgb`) from a connection target.
///
/// Returns the prim path and the property name.
pub fn split_property(target: &str) -> (&str, &str) {
    // Prim names never contain '.', so the first dot after the last '/' starts the property.
    let last_slash = target.rfind('/').unwrap_or(0);
    match target[last_slash..].find('.') {
        Some(dot) => (&target[..last_slash + dot], &target[last_slash + dot + 1..]),
        None => (target, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_identifier("body"));
        assert!(is_valid_identifier("_body2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2body"));
        assert!(!is_valid_identifier("body material"));
        assert!(!is_valid_identifier("body-1"));
    }

    #[test]
    fn test_make_valid_identifier() {
        assert_eq!(make_valid_identifier("body material"), "body_material");
        assert_eq!(make_valid_identifier("1st"), "_1st");
        assert_eq!(make_valid_identifier(""), "_");
        assert_eq!(make_valid_identifier("ok_name"), "ok_name");
    }

    #[test]
    fn test_join_and_split() {
        assert_eq!(join("/", "Asset"), "/Asset");
        assert_eq!(join("/Asset", "Materials"), "/Asset/Materials");
        assert_eq!(parent("/Asset/Materials"), "/Asset");
        assert_eq!(parent("/Asset"), "/");
        assert_eq!(name("/Asset/Materials/body"), "body");
    }

    #[test]
    fn test_prim_path_validation() {
        assert!(is_valid_prim_path("/Asset/Materials/body"));
        assert!(!is_valid_prim_path("Asset/body"));
        assert!(!is_valid_prim_path("/Asset/bad name"));
        assert!(!is_valid_prim_path("/Asset//body"));
    }

    #[test]
    fn test_split_property() {
        let (prim, prop) = split_property("/Mat/diffuseColor_texture.outputs:rgb");
        assert_eq!(prim, "/Mat/diffuseColor_texture");
        assert_eq!(prop, "outputs:rgb");
        assert_eq!(split_property("/Mat/Shader"), ("/Mat/Shader", ""));
    }
}
