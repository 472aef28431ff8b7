//! Hierarchical event-name matching.
//!
//! Names are split on the channel delimiter. `*` matches exactly one segment
//! and `**` matches zero or more. Wildcards count on either side, so a
//! listener on `user.name` hears an emission of `user.*`.

/// Returns true if `pattern` and `name` match.
///
/// With `wildcard` off the comparison is exact.
#[must_use]
pub fn matches(pattern: &str, name: &str, wildcard: bool, delimiter: char) -> bool {
    if !wildcard || pattern == name {
        return pattern == name;
    }
    if !has_wildcard(pattern, delimiter) && !has_wildcard(name, delimiter) {
        return false;
    }
    let left: Vec<&str> = pattern.split(delimiter).collect();
    let right: Vec<&str> = name.split(delimiter).collect();
    segments_match(&left, &right)
}

/// Returns true if `name` contains a wildcard segment.
#[must_use]
pub fn has_wildcard(name: &str, delimiter: char) -> bool {
    name.split(delimiter).any(|s| s == "*" || s == "**")
}

fn segments_match(left: &[&str], right: &[&str]) -> bool {
    match (left.split_first(), right.split_first()) {
        (None, None) => true,
        (Some((&"**", rest)), _) => {
            segments_match(rest, right) || (!right.is_empty() && segments_match(left, &right[1..]))
        }
        (_, Some((&"**", rest))) => {
            segments_match(left, rest) || (!left.is_empty() && segments_match(&left[1..], right))
        }
        (Some((l, left_rest)), Some((r, right_rest))) => {
            (*l == "*" || *r == "*" || l == r) && segments_match(left_rest, right_rest)
        }
        _ => false,
    }
}
