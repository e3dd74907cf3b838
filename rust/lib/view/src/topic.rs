/// Match a concrete path against a subscription pattern.
///
/// Levels are separated by `/`. `+` matches exactly one level; `#` matches
/// the rest of the path (zero or more levels) and must be the last level.
pub fn topic_matches(pattern: &str, path: &str) -> bool {
    let mut pattern_levels = pattern.split('/');
    let mut path_levels = path.split('/');

    loop {
        match (pattern_levels.next(), path_levels.next()) {
            (Some("#"), _) => return pattern_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(p), Some(t)) if p == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
