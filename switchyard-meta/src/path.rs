//! Path pattern normalization.

/// Joins a controller prefix and a method mapping into a full path pattern.
///
/// The prefix loses its trailing slash unless it is exactly `/`, the mapping
/// gains a leading slash, repeated slashes collapse into one and a trailing
/// slash is dropped from anything but the root pattern.
///
/// ```
/// use switchyard_meta::join_mapping;
///
/// assert_eq!(join_mapping("/users/", "{id}"), "/users/{id}");
/// assert_eq!(join_mapping("/", "/health"), "/health");
/// assert_eq!(join_mapping("", ""), "/");
/// ```
pub fn join_mapping(prefix: &str, mapping: &str) -> String {
    let prefix = prefix.trim();
    let prefix = if prefix == "/" {
        prefix
    } else {
        prefix.trim_end_matches('/')
    };
    let mapping = mapping.trim();

    let mut joined = String::with_capacity(prefix.len() + mapping.len() + 2);
    if !prefix.is_empty() && !prefix.starts_with('/') {
        joined.push('/');
    }
    joined.push_str(prefix);
    if !mapping.starts_with('/') {
        joined.push('/');
    }
    joined.push_str(mapping);

    normalize_path(&joined)
}

/// Collapses duplicate slashes and strips the trailing slash of a non-root path.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    if !path.starts_with('/') {
        out.push('/');
    }
    let mut last_slash = false;
    for c in path.chars() {
        if c == '/' {
            if last_slash {
                continue;
            }
            last_slash = true;
        } else {
            last_slash = false;
        }
        out.push(c);
    }
    while out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}
