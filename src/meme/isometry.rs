//! Meme isometry: how many of a candidate's memes a target set already has.

use std::collections::BTreeSet;

use super::normalize;

/// A normalised target meme set to score candidates against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemeIsometry {
    sources: BTreeSet<String>,
}

impl MemeIsometry {
    pub fn of<I, S>(memes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            sources: memes.into_iter().map(|m| normalize(m.as_ref())).collect(),
        }
    }

    /// Counts distinct candidate memes that exactly match a target meme.
    pub fn score<S: AsRef<str>>(&self, candidate: &[S]) -> usize {
        candidate
            .iter()
            .map(|m| normalize(m.as_ref()))
            .collect::<BTreeSet<_>>()
            .iter()
            .filter(|m| self.sources.contains(*m))
            .count()
    }

    pub fn sources(&self) -> &BTreeSet<String> {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn constellation(&self) -> String {
        constellation(self.sources.iter())
    }
}

/// Scores `candidate` against `target`; see [`MemeIsometry::score`].
pub fn score<S: AsRef<str>, T: AsRef<str>>(candidate: &[S], target: &[T]) -> usize {
    MemeIsometry::of(target).score(candidate)
}

/// Sorted, de-duplicated, `_`-joined normalised memes, e.g. `DARK_WINTER`.
pub fn constellation<I, S>(memes: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    memes
        .into_iter()
        .map(|m| normalize(m.as_ref()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_of_self_is_size() {
        let x = ["WINTER", "DARK", "SLOW"];
        assert_eq!(score(&x, &x), 3);
    }

    #[test]
    fn score_against_empty_is_zero() {
        assert_eq!(score(&["WINTER"], &[] as &[&str]), 0);
        assert_eq!(score(&[] as &[&str], &["WINTER"]), 0);
    }

    #[test]
    fn score_normalizes_and_ignores_duplicates() {
        assert_eq!(score(&["winter", "WINTER ", "cold"], &["WINTER", "DARK"]), 1);
    }

    #[test]
    fn score_is_symmetric_for_identical_sets() {
        let a = ["A", "B"];
        let b = ["b", "a"];
        assert_eq!(score(&a, &b), score(&b, &a));
    }

    #[test]
    fn no_partial_credit() {
        assert_eq!(score(&["WINTERY"], &["WINTER"]), 0);
    }

    #[test]
    fn constellation_is_sorted() {
        assert_eq!(constellation(["winter", "Dark", "dark"]), "DARK_WINTER");
        assert_eq!(MemeIsometry::of(Vec::<String>::new()).constellation(), "");
    }
}
