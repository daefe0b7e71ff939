//! AMQP topic binding match
//!
//! Words are separated by `.`; `*` matches exactly one word and `#` matches
//! zero or more.

/// Whether `routing_key` matches binding `pattern`
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches_words(&pattern, &key)
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match (pattern.split_first(), key.split_first()) {
        (None, None) => true,
        (Some((&"#", rest)), _) => {
            matches_words(rest, key) || (!key.is_empty() && matches_words(pattern, &key[1..]))
        }
        (Some((&"*", rest)), Some((_, key_rest))) => matches_words(rest, key_rest),
        (Some((word, rest)), Some((candidate, key_rest))) => {
            word == candidate && matches_words(rest, key_rest)
        }
        _ => false,
    }
}
