//! Path and slug helpers.
//!
//! Every function here is pure. Paths are slash-joined `full_slug` values such as
//! `app/de/page`; leading and trailing slashes are ignored so folder paths
//! reported as `app/de/` compare equal to `app/de`.

use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::space::TranslatedSlug;

/// Slug used when normalization leaves nothing behind.
pub const FALLBACK_SLUG: &str = "copy";

/// Normalize arbitrary text into a single path-safe slug segment.
///
/// German umlauts and `ß` are transliterated (`ä` → `ae`, `ß` → `ss`), other
/// diacritics are stripped, and every run of characters outside
/// `[a-z0-9_]` collapses into a single `-`.
///
/// ```
/// use spacesync::slug::normalize_slug;
///
/// assert_eq!(normalize_slug("äöü ß"), "aeoeue-ss");
/// assert_eq!(normalize_slug("Hello, World!"), "hello-world");
/// assert_eq!(normalize_slug(""), "copy");
/// ```
pub fn normalize_slug(input: &str) -> String {
    let mut transliterated = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            'ä' | 'Ä' => transliterated.push_str("ae"),
            'ö' | 'Ö' => transliterated.push_str("oe"),
            'ü' | 'Ü' => transliterated.push_str("ue"),
            'ß' | 'ẞ' => transliterated.push_str("ss"),
            other => transliterated.push(other),
        }
    }

    let mut slug = String::with_capacity(transliterated.len());
    let mut pending_dash = false;
    for c in transliterated.nfd().filter(|c| !is_combining_mark(*c)) {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Strip leading and trailing slashes.
#[inline]
pub fn trim_path(path: &str) -> &str {
    path.trim_matches('/')
}

/// Join a parent path and a slug. An empty parent yields the slug itself.
pub fn join_path(parent: &str, slug: &str) -> String {
    let parent = trim_path(parent);
    if parent.is_empty() {
        slug.to_string()
    } else {
        format!("{}/{}", parent, slug)
    }
}

/// Parent path of `full_slug`, or `""` for a root entry.
pub fn parent_path(full_slug: &str) -> &str {
    let path = trim_path(full_slug);
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Last segment of a path.
pub fn last_segment(path: &str) -> &str {
    let path = trim_path(path);
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Number of segments in a path. Roots have depth 1, the empty path depth 0.
pub fn depth(full_slug: &str) -> usize {
    let path = trim_path(full_slug);
    if path.is_empty() {
        0
    } else {
        path.split('/').count()
    }
}

/// All ancestor paths of `full_slug`, shallowest first, excluding the leaf.
///
/// ```
/// use spacesync::slug::ancestor_paths;
///
/// assert_eq!(ancestor_paths("app/de/page"), vec!["app", "app/de"]);
/// assert!(ancestor_paths("page").is_empty());
/// ```
pub fn ancestor_paths(full_slug: &str) -> Vec<String> {
    let path = trim_path(full_slug);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 {
        return Vec::new();
    }

    (1..segments.len())
        .map(|end| segments[..end].join("/"))
        .collect()
}

/// Replace the trailing segment of `path` with `new_slug`.
pub fn replace_last_segment(path: &str, new_slug: &str) -> String {
    join_path(parent_path(path), new_slug)
}

/// Rewrite localized path variants for a renamed node.
///
/// Each variant keeps its language and parent path but ends in `new_slug`.
/// Per-variant ids are cleared since the variants will belong to a new record.
pub fn rewrite_translated_paths(
    variants: &[TranslatedSlug],
    new_slug: &str,
) -> Vec<TranslatedSlug> {
    variants
        .iter()
        .map(|variant| TranslatedSlug {
            lang: variant.lang.clone(),
            path: replace_last_segment(&variant.path, new_slug),
            name: variant.name.clone(),
            id: None,
        })
        .collect()
}

/// Make `slug` unique among the children of `parent`.
///
/// `existing` holds full paths already taken. When `parent/slug` is free the
/// slug is returned unchanged, otherwise `-1`, `-2`, ... is appended until a
/// free path is found.
///
/// ```
/// use spacesync::slug::ensure_unique_slug_in_folder;
///
/// let taken = ["parent/article-copy"];
/// assert_eq!(
///     ensure_unique_slug_in_folder("parent", "article-copy", taken),
///     "article-copy-1"
/// );
/// ```
pub fn ensure_unique_slug_in_folder<I, S>(parent: &str, slug: &str, existing: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let taken: HashSet<String> = existing
        .into_iter()
        .map(|p| trim_path(p.as_ref()).to_string())
        .collect();

    if !taken.contains(&join_path(parent, slug)) {
        return slug.to_string();
    }

    let mut suffix = 1usize;
    loop {
        let candidate = format!("{}-{}", slug, suffix);
        if !taken.contains(&join_path(parent, &candidate)) {
            return candidate;
        }
        suffix += 1;
    }
}
