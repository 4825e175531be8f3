//! Parser for flat and grouped (two-level) list values.
//!
//! Several settings accept a comma-separated list, and a few accept one
//! sub-list per host written as parenthesized groups:
//!
//! ```text
//! (metric-a, metric-b), (metric-c)
//! ```
//!
//! When the input contains no parentheses at all it is treated as a single
//! implicit group, so plain comma lists and grouped lists can share one
//! option. Both parsers are pure functions over their input.

use crate::error::ConfigError;

/// Sentinel value operators may use to explicitly mark a setting as absent.
pub const UNAVAILABLE: &str = "UNAVAILABLE";

/// Splits a comma-separated list of items.
///
/// Items are trimmed of surrounding whitespace; empty items between commas
/// are preserved as empty strings so callers can decide their significance.
/// Blank input or the literal sentinel `UNAVAILABLE` yields an empty list.
#[must_use]
pub fn split_list(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNAVAILABLE) {
        return Vec::new();
    }

    trimmed.split(',').map(|item| item.trim().to_string()).collect()
}

/// Splits a comma/whitespace separated list of parenthesized sub-lists.
///
/// Grammar (informal):
///
/// ```text
/// groupedList := group (','? group)*
/// group       := '(' flatList ')'
/// flatList    := item (',' item)*
/// ```
///
/// A trailing comma after the last group is permitted. If the input contains
/// no parentheses it is parsed as one implicit group. Nesting deeper than one
/// level is not representable: an inner `(` simply never matches a group and
/// surfaces as leftover input.
///
/// # Errors
///
/// Returns [`ConfigError::ListSyntax`] when non-whitespace input remains
/// after the last parseable group, carrying both the original input and the
/// unconsumed remainder for diagnostics.
pub fn split_grouped_list(text: &str) -> Result<Vec<Vec<String>>, ConfigError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNAVAILABLE) {
        return Ok(Vec::new());
    }

    // No parentheses anywhere: treat the whole input as one implicit group.
    if !trimmed.contains('(') && !trimmed.contains(')') {
        return Ok(vec![split_list(trimmed)]);
    }

    let leftover = |remainder: &str| ConfigError::ListSyntax {
        input: text.to_string(),
        remainder: remainder.to_string(),
    };

    let (first, mut rest) = take_group(trimmed).ok_or_else(|| leftover(trimmed))?;
    let mut groups = vec![first];

    loop {
        // Groups are separated by an optional comma; a comma after the final
        // group is also accepted.
        let mut next = rest.trim_start();
        if let Some(after_comma) = next.strip_prefix(',') {
            next = after_comma.trim_start();
        }
        if next.is_empty() {
            return Ok(groups);
        }

        match take_group(next) {
            Some((items, remaining)) => {
                groups.push(items);
                rest = remaining;
            }
            None => return Err(leftover(rest)),
        }
    }
}

/// Consumes one leading `( ... )` group.
///
/// Returns the group's items and the unconsumed remainder, or `None` when
/// the input does not start with a well-formed group. Group bodies may not
/// themselves contain parentheses, and must not be blank.
fn take_group(input: &str) -> Option<(Vec<String>, &str)> {
    let body_and_rest = input.trim_start().strip_prefix('(')?;
    let close = body_and_rest.find(')')?;
    let body = &body_and_rest[..close];
    if body.contains('(') || body.trim().is_empty() {
        return None;
    }

    let items = body.split(',').map(|item| item.trim().to_string()).collect();
    Some((items, &body_and_rest[close + 1..]))
}
