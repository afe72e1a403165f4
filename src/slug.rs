// src/slug.rs

/// Derives the URL slug for a title: lower-case ASCII letters and digits, every run
/// of anything else collapsed to one hyphen, no hyphen at either end.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// True when `slug` is already in the form `slugify` produces.
pub fn is_canonical(slug: &str) -> bool {
    !slug.is_empty() && slugify(slug) == slug
}

/// Picks `base`, or the first `base-N` (N >= 2) not present in `taken`.
pub fn first_free(base: &str, taken: &[String]) -> String {
    if !taken.iter().any(|s| s == base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.iter().any(|s| s == candidate))
        .unwrap_or_else(|| base.to_string())
}
