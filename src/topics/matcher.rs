//! MQTT-style wildcard matching of topic patterns against concrete topics.
//!
//! Which messages a monitor view gets to see depends on byte-for-byte level
//! matching, so this is implemented over `/`-split level sequences rather than
//! any substring or regex approximation. `+` matches exactly one level, `#`
//! matches the parent level and everything below it and is only legal as the
//! final level. Patterns with a misplaced `#` never reach this function; they
//! are rejected when the template is authored (see [`super::store`]).

/// Returns true if `topic` falls under the wildcard `pattern`.
///
/// Levels are produced by naive `/`-splitting: an empty level (from a leading,
/// trailing or doubled slash) is a literal that must match another empty level
/// unless the pattern level is `+` or `#`.
///
/// Per the domain convention, `a/#` also matches the parent topic `a` itself.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    if pattern == topic || pattern == "#" {
        return true;
    }

    let pattern_levels: Vec<&str> = pattern.split('/').collect();
    let topic_levels: Vec<&str> = topic.split('/').collect();

    if pattern_levels.last() == Some(&"#") {
        let prefix = &pattern_levels[..pattern_levels.len() - 1];
        // The topic may be exactly the parent or anything below it.
        if topic_levels.len() < prefix.len() {
            return false;
        }
        return prefix
            .iter()
            .zip(topic_levels.iter())
            .all(|(p, t)| *p == "+" || p == t);
    }

    pattern_levels.len() == topic_levels.len()
        && pattern_levels
            .iter()
            .zip(topic_levels.iter())
            .all(|(p, t)| *p == "+" || p == t)
}
