//! Filename and path validation.
//!
//! The validators are plain predicates. [`clean`] is the only transform and
//! it is total: its output always passes [`is_clean_filename`].

/// Longest path accepted by [`is_allowed_length`], in characters.
pub const MAX_PATH_LENGTH: usize = 1024;

/// Names that collide with inherited object properties when a path is used
/// as a lookup key.
pub const BLOCKED_FILENAMES: &[&str] = &[
    "prototype",
    "constructor",
    "toString",
    "toLocaleString",
    "valueOf",
    "hasOwnProperty",
    "isPrototypeOf",
    "propertyIsEnumerable",
    "__defineGetter__",
    "__lookupGetter__",
    "__defineSetter__",
    "__lookupSetter__",
    "__proto__",
];

// Rust strings cannot hold lone surrogates, so only the control ranges remain.
fn is_bad_char(c: char) -> bool {
    matches!(c, '/' | '\\' | '*' | '\u{00}'..='\u{1F}' | '\u{7F}'..='\u{9F}')
}

fn is_space(c: char) -> bool {
    c.is_whitespace() || c == '\u{FEFF}'
}

pub fn is_blocked_filename(name: &str) -> bool {
    BLOCKED_FILENAMES.contains(&name)
}

/// Whether `name` can be stored as a single doc, file, or folder name.
///
/// Reserved property names are accepted here; only full paths reject them.
pub fn is_clean_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.chars().any(is_bad_char)
        && !name.starts_with(is_space)
        && !name.ends_with(is_space)
}

/// Whether `path` is safe to store and address later.
///
/// A leading `/` is optional and empty interior segments are tolerated, but
/// the path must not end in `/`. Every other segment must be a clean filename
/// and must not be a reserved property name.
pub fn is_clean_path(path: &str) -> bool {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.last().is_some_and(|last| last.is_empty()) {
        return false;
    }
    segments
        .iter()
        .filter(|segment| !segment.is_empty())
        .all(|segment| {
            is_clean_filename(segment) && !is_blocked_filename(segment.trim_matches(is_space))
        })
}

pub fn is_allowed_length(path: &str) -> bool {
    let length = path.chars().count();
    length > 0 && length <= MAX_PATH_LENGTH
}

/// Sanitizes `name` into something [`is_clean_filename`] accepts.
///
/// Disallowed characters become `_`, leading and trailing whitespace is
/// replaced one character at a time, `.`/`..` become `_`/`__`, and reserved
/// names get an `@` prefix. Applying it twice changes nothing.
pub fn clean(name: &str) -> String {
    let replaced: Vec<char> = name
        .chars()
        .map(|c| if is_bad_char(c) { '_' } else { c })
        .collect();

    let leading = replaced.iter().take_while(|c| is_space(**c)).count();
    let trailing = replaced[leading..].iter().rev().take_while(|c| is_space(**c)).count();
    let end = replaced.len() - trailing;

    let mut cleaned = String::with_capacity(name.len());
    cleaned.extend(std::iter::repeat_n('_', leading));
    cleaned.extend(&replaced[leading..end]);
    cleaned.extend(std::iter::repeat_n('_', trailing));

    let cleaned = match cleaned.as_str() {
        "" | "." => "_".to_string(),
        ".." => "__".to_string(),
        _ => cleaned,
    };

    if is_blocked_filename(&cleaned) {
        format!("@{cleaned}")
    } else {
        cleaned
    }
}
