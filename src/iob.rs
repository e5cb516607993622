/*!
Pairing of IOB labels. When a word is split into several subwords, only its first subword may keep
a begin label (`B-PER`); the continuation subwords must carry the paired inside label (`I-PER`).
This module derives the `begin -> inside` mapping from a label vocabulary, either on the names
themselves or on their integer ids.
*/
use crate::error::LabelError;
use crate::vocabulary::LabelVocabulary;
use ahash::{AHashMap, AHashSet};
use std::hash::Hash;

const BEGIN_PREFIX: &str = "B-";
const INSIDE_PREFIX: &str = "I-";

/// Immutable mapping from each begin label to its paired inside label. Begin labels without an
/// inside partner in the vocabulary are left out.
///
/// ```rust
/// use tokclass::{IobMapping, LabelVocabulary};
///
/// let vocabulary = LabelVocabulary::new(["O", "B-PER", "I-PER", "B-ORG"]).unwrap();
/// let by_name = IobMapping::from_names(vocabulary.names());
/// assert_eq!(by_name.get(&String::from("B-PER")).map(String::as_str), Some("I-PER"));
/// assert_eq!(by_name.get(&String::from("B-ORG")), None);
///
/// let by_id = IobMapping::from_vocabulary(&vocabulary);
/// assert_eq!(by_id.get(&1), Some(&2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IobMapping<L>
where
    L: Eq + Hash,
{
    inner: AHashMap<L, L>,
}

impl<L: Eq + Hash> Default for IobMapping<L> {
    fn default() -> Self {
        Self {
            inner: AHashMap::default(),
        }
    }
}

/// Extracts `tag` from a label starting with `B-` followed by at least one word character. The
/// tag stops at the first character that is neither alphanumeric nor `_`, so `B-PER-X` yields
/// `PER`.
fn begin_tag(label: &str) -> Option<&str> {
    let rest = label.strip_prefix(BEGIN_PREFIX)?;
    let end = rest
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    match end {
        0 => None,
        n => Some(&rest[..n]),
    }
}

/// Yields every `(begin, inside)` pair of names present in `names`, plus the unpaired begin
/// labels.
fn pair_names<S: AsRef<str>>(names: &[S]) -> (Vec<(&str, String)>, Vec<&str>) {
    let present: AHashSet<&str> = names.iter().map(AsRef::as_ref).collect();
    let mut pairs = Vec::new();
    let mut unpaired = Vec::new();
    for label in names.iter().map(AsRef::as_ref) {
        let Some(tag) = begin_tag(label) else {
            continue;
        };
        let inside = format!("{INSIDE_PREFIX}{tag}");
        if present.contains(inside.as_str()) {
            pairs.push((label, inside));
        } else {
            unpaired.push(label);
        }
    }
    (pairs, unpaired)
}

impl IobMapping<String> {
    /// Builds the name-keyed mapping. Never fails: labels not matching `B-<tag>` and begin labels
    /// without `I-<tag>` are skipped.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let (pairs, unpaired) = pair_names(names);
        if !unpaired.is_empty() {
            log::warn!(
                "Begin labels without an inside label are left out of the IOB mapping: {:?}",
                unpaired
            );
        }
        let inner: AHashMap<String, String> = pairs
            .into_iter()
            .map(|(begin, inside)| (String::from(begin), inside))
            .collect();
        log::debug!("Built an IOB mapping with {} pairs", inner.len());
        Self { inner }
    }

    /// Same as `from_names`, but every begin label must have its inside partner.
    pub fn try_strict_from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, LabelError> {
        let (_, unpaired) = pair_names(names);
        if unpaired.is_empty() {
            Ok(Self::from_names(names))
        } else {
            Err(LabelError::UnpairedBeginLabels(
                unpaired.into_iter().map(String::from).collect(),
            ))
        }
    }
}

impl IobMapping<i64> {
    /// Builds the id-keyed mapping used at runtime, where labels are vocabulary positions.
    pub fn from_vocabulary(vocabulary: &LabelVocabulary) -> Self {
        let by_name = IobMapping::from_names(vocabulary.names());
        Self::from_name_mapping(vocabulary, &by_name)
    }

    /// Strict counterpart of `from_vocabulary`.
    pub fn try_strict_from_vocabulary(vocabulary: &LabelVocabulary) -> Result<Self, LabelError> {
        let by_name = IobMapping::try_strict_from_names(vocabulary.names())?;
        Ok(Self::from_name_mapping(vocabulary, &by_name))
    }

    fn from_name_mapping(vocabulary: &LabelVocabulary, by_name: &IobMapping<String>) -> Self {
        // Both names come from the vocabulary, so both lookups succeed.
        let inner = by_name
            .inner
            .iter()
            .filter_map(|(begin, inside)| {
                let begin_id = vocabulary.id_of(begin)?;
                let inside_id = vocabulary.id_of(inside)?;
                Some((begin_id as i64, inside_id as i64))
            })
            .collect();
        Self { inner }
    }
}

impl<L: Eq + Hash> IobMapping<L> {
    /// Returns the inside label paired with `begin`, if any.
    #[inline]
    pub fn get(&self, begin: &L) -> Option<&L> {
        self.inner.get(begin)
    }

    pub fn contains_key(&self, begin: &L) -> bool {
        self.inner.contains_key(begin)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&L, &L)> {
        self.inner.iter()
    }
}

impl<L: Eq + Hash + Ord + Clone> IobMapping<L> {
    /// Pairs sorted by begin label.
    pub fn sorted_pairs(&self) -> Vec<(L, L)> {
        let mut pairs: Vec<(L, L)> = self
            .inner
            .iter()
            .map(|(b, i)| (b.clone(), i.clone()))
            .collect();
        pairs.sort();
        pairs
    }
}

impl<L: Eq + Hash> FromIterator<(L, L)> for IobMapping<L> {
    fn from_iter<T: IntoIterator<Item = (L, L)>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}
