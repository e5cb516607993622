/*!
The label vocabulary is the ordered list of label names of a task. The position of a name is the
integer label used by the model, so the order must stay the same between training and inference.
*/
use crate::error::LabelError;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::slice::Iter;

/// Ordered list of distinct label names, e.g. `['O', 'B-PER', 'I-PER']`.
///
/// ```rust
/// use tokclass::LabelVocabulary;
///
/// let vocabulary = LabelVocabulary::new(["O", "B-PER", "I-PER"]).unwrap();
/// assert_eq!(vocabulary.id_of("I-PER"), Some(2));
/// assert_eq!(vocabulary.name_of(1), Some("B-PER"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelVocabulary {
    names: Vec<String>,
    ids: AHashMap<String, usize>,
}

impl LabelVocabulary {
    /// Builds the vocabulary. Fails if a name is repeated.
    pub fn new<I, S>(names: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut ids = AHashMap::with_capacity(names.len());
        for (position, name) in names.iter().enumerate() {
            if let Some(first) = ids.insert(name.clone(), position) {
                return Err(LabelError::DuplicateLabel {
                    name: name.clone(),
                    first,
                    second: position,
                });
            }
        }
        log::debug!("Built a label vocabulary of {} labels", names.len());
        Ok(Self { names, ids })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    /// Returns the name of a label id. Negative ids (such as the ignore sentinel) and ids past
    /// the end of the vocabulary return `None`.
    pub fn name_of<I>(&self, id: I) -> Option<&str>
    where
        I: TryInto<usize>,
    {
        let index: usize = id.try_into().ok()?;
        self.names.get(index).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ids.contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> Iter<'_, String> {
        self.names.iter()
    }
}

/// Two vocabularies are equal when they list the same names in the same order.
impl PartialEq for LabelVocabulary {
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names
    }
}
impl Eq for LabelVocabulary {}

impl TryFrom<Vec<String>> for LabelVocabulary {
    type Error = LabelError;
    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LabelVocabulary> for Vec<String> {
    fn from(value: LabelVocabulary) -> Self {
        value.names
    }
}

impl<'a> IntoIterator for &'a LabelVocabulary {
    type Item = &'a String;
    type IntoIter = Iter<'a, String>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Display for LabelVocabulary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.names.join(", "))
    }
}
