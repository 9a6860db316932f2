//! Admissibility of meme combinations against a taxonomy.

use std::collections::BTreeSet;

use super::isometry::constellation;
use super::taxonomy::MemeTaxonomy;
use super::{normalize, MemeKind, ParsedMeme};

/// The memes active in a segment, checked against a taxonomy.
#[derive(Debug, Clone)]
pub struct MemeStack<'a> {
    taxonomy: &'a MemeTaxonomy,
    memes: BTreeSet<String>,
}

impl<'a> MemeStack<'a> {
    pub fn from<I, S>(taxonomy: &'a MemeTaxonomy, memes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            taxonomy,
            memes: memes.into_iter().map(|m| normalize(m.as_ref())).collect(),
        }
    }

    /// Returns true if adding `candidate` to this stack keeps it admissible.
    pub fn is_allowed<S: AsRef<str>>(&self, candidate: &[S]) -> bool {
        let candidate: Vec<String> = candidate.iter().map(|m| normalize(m.as_ref())).collect();
        first_conflict(self.taxonomy, &candidate, &self.memes).is_none()
    }

    /// Returns true if the stack on its own is admissible.
    pub fn is_valid(&self) -> bool {
        let none: BTreeSet<String> = BTreeSet::new();
        let all: Vec<String> = self.memes.iter().cloned().collect();
        first_conflict(self.taxonomy, &all, &none).is_none()
    }

    /// Adds memes without checking admissibility.
    pub fn extend<S: AsRef<str>>(&mut self, memes: &[S]) {
        self.memes.extend(memes.iter().map(|m| normalize(m.as_ref())));
    }

    pub fn memes(&self) -> &BTreeSet<String> {
        &self.memes
    }

    pub fn constellation(&self) -> String {
        constellation(self.memes.iter())
    }
}

/// Returns true if `candidate` may join `current` without violating the taxonomy.
pub fn is_allowed<S: AsRef<str>, T: AsRef<str>>(
    taxonomy: &MemeTaxonomy,
    candidate: &[S],
    current: &[T],
) -> bool {
    MemeStack::from(taxonomy, current.iter().map(|m| m.as_ref())).is_allowed(candidate)
}

/// Finds the first rule broken by `candidate ∪ current`, as a description.
fn first_conflict(
    taxonomy: &MemeTaxonomy,
    candidate: &[String],
    current: &BTreeSet<String>,
) -> Option<String> {
    let union: BTreeSet<&String> = candidate.iter().chain(current.iter()).collect();
    let parsed: Vec<ParsedMeme> = union.iter().map(|m| ParsedMeme::parse(m)).collect();

    for anti in parsed.iter().filter(|p| p.kind == MemeKind::Anti) {
        if parsed
            .iter()
            .any(|p| p.kind != MemeKind::Anti && p.body == anti.body)
        {
            return Some(format!("!{} excludes {}", anti.body, anti.body));
        }
    }

    for raw in candidate {
        let meme = ParsedMeme::parse(raw);
        if meme.kind == MemeKind::Unique
            && current
                .iter()
                .map(|c| ParsedMeme::parse(c))
                .any(|c| c.kind != MemeKind::Anti && c.body == meme.body)
        {
            return Some(format!("${} already present", meme.body));
        }
    }

    let mut occupied: Vec<(&str, &str)> = Vec::new();
    for meme in parsed.iter().filter(|p| p.kind != MemeKind::Anti) {
        for category in taxonomy.exclusive_categories_of(&meme.body) {
            if let Some((_, other)) = occupied
                .iter()
                .find(|(name, body)| *name == category.name && *body != meme.body)
            {
                return Some(format!(
                    "{} and {} both in exclusive category {}",
                    other, meme.body, category.name
                ));
            }
            occupied.push((category.name.as_str(), meme.body.as_str()));
        }
    }

    None
}
