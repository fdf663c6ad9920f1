//! Natural ordering of issue keys (`PROJ-9` sorts before `PROJ-10`).

use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^(.+)-(\d+)$").unwrap()
});

/// Split an issue key into project prefix and sequence number.
#[must_use]
pub fn parse_key(key: &str) -> Option<(&str, u64)> {
    let caps = KEY_PATTERN.captures(key)?;
    let prefix = caps.get(1)?.as_str();
    let number = caps.get(2)?.as_str().parse().ok()?;
    Some((prefix, number))
}

/// Compare two issue keys naturally.
///
/// Keys of the form `PREFIX-N` compare by prefix, then numerically by `N`.
/// Keys that do not match the form sort after the ones that do, in plain
/// lexicographic order.
#[must_use]
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (parse_key(a), parse_key(b)) {
        (Some((prefix_a, num_a)), Some((prefix_b, num_b))) => prefix_a
            .cmp(prefix_b)
            .then(num_a.cmp(&num_b))
            .then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
