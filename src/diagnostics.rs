//! Typo suggestions and non-fatal parse diagnostics.

use std::fmt;

use crate::error::Location;

/// Levenshtein distance with unit costs, computed over characters with a
/// single DP row.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        // row[0] before overwrite is the diagonal for column 1.
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let substitution = diagonal + usize::from(ca != *cb);
            row[j + 1] = substitution.min(above + 1).min(row[j] + 1);
            diagonal = above;
        }
    }

    row[b.len()]
}

/// The candidate closest to `key`. Candidates are expected in a fixed
/// order; on a tie the first one wins.
pub fn nearest_key<'a, I>(key: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, usize)> = None;
    for candidate in candidates {
        let distance = edit_distance(key, candidate);
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((candidate, distance));
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// A key was defined again without the `override` keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub key: String,
    pub location: Location,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "the key '{}' at {} redefines an earlier definition; use 'override' to silence this",
            self.key, self.location
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "", 0)]
    #[case("abc", "", 3)]
    #[case("", "abc", 3)]
    #[case("key", "key", 0)]
    #[case("ky", "key", 1)]
    #[case("kitten", "sitting", 3)]
    #[case("flaw", "lawn", 2)]
    #[case("größe", "grösse", 2)]
    fn computes_edit_distance(#[case] a: &str, #[case] b: &str, #[case] expected: usize) {
        assert_eq!(edit_distance(a, b), expected);
        assert_eq!(edit_distance(b, a), expected);
    }

    #[test]
    fn picks_the_nearest_key() {
        let keys = ["height", "key", "width"];
        assert_eq!(nearest_key("ky", keys), Some("key"));
        assert_eq!(nearest_key("widht", keys), Some("width"));
    }

    #[test]
    fn ties_go_to_the_first_candidate() {
        assert_eq!(nearest_key("b", ["a", "c"]), Some("a"));
    }

    #[test]
    fn no_candidates_means_no_suggestion() {
        assert_eq!(nearest_key("anything", std::iter::empty()), None);
    }
}
