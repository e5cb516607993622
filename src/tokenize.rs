/*!
Batched tokenize-and-align pipeline. A record batch maps column names to columns; the pipeline
tokenizes the pre-split words of the input column and aligns the word labels of the label column
to the resulting subwords.

```text
{"tokens": [["EU", "rejects"]], "labels": [[3, 0]]}
        | BatchTokenizer
        v
[CLS] EU rej ##ects [SEP]      word ids: [None, 0, 1, 1, None]
        | LabelAligner
        v
labels: [-100, 3, 0, 0, -100]
```
*/
use crate::aligner::LabelAligner;
use crate::config::TokenClassificationConfig;
use crate::error::AlignmentError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

const DEFAULT_INPUT_COLUMN: &str = "tokens";
const DEFAULT_LABEL_COLUMN: &str = "labels";

/// Gives, for every subword of an encoding, the index of the word it comes from. Special tokens
/// map to `None`.
pub trait WordIds {
    fn word_ids(&self) -> Vec<Option<usize>>;
}

/// Subword tokenizer over pre-split words. Truncation is the tokenizer's business.
pub trait BatchTokenizer {
    type Encoding: WordIds;
    fn tokenize_batch(&self, words: &[Vec<String>]) -> Result<Vec<Self::Encoding>, AlignmentError>;
}

/// Column of a record batch: a list of word lists or a list of label lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Column {
    Words(Vec<Vec<String>>),
    Labels(Vec<Vec<i64>>),
}

impl Column {
    /// Lists of empty lists deserialize as words; they are valid labels too.
    fn as_labels(&self) -> Option<Cow<'_, [Vec<i64>]>> {
        match self {
            Column::Labels(labels) => Some(Cow::Borrowed(labels)),
            Column::Words(words) if words.iter().all(Vec::is_empty) => {
                Some(Cow::Owned(vec![Vec::new(); words.len()]))
            }
            Column::Words(_) => None,
        }
    }
}

/// Columnar record batch, as in `{"tokens": [["EU", "rejects"]], "labels": [[3, 0]]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch {
    columns: BTreeMap<String, Column>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, column: Column) -> Option<Column> {
        self.columns.insert(name.into(), column)
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    fn column(&self, name: &str) -> Result<&Column, AlignmentError> {
        self.get(name)
            .ok_or_else(|| AlignmentError::ColumnNotFound(String::from(name)))
    }

    /// Word lists of the column `name`.
    pub fn words(&self, name: &str) -> Result<&[Vec<String>], AlignmentError> {
        match self.column(name)? {
            Column::Words(words) => Ok(words),
            Column::Labels(_) => Err(AlignmentError::ColumnType {
                column: String::from(name),
                expected: "word lists",
            }),
        }
    }

    /// Label lists of the column `name`.
    pub fn labels(&self, name: &str) -> Result<Cow<'_, [Vec<i64>]>, AlignmentError> {
        self.column(name)?
            .as_labels()
            .ok_or_else(|| AlignmentError::ColumnType {
                column: String::from(name),
                expected: "label lists",
            })
    }
}

impl<S: Into<String>> FromIterator<(S, Column)> for Batch {
    fn from_iter<T: IntoIterator<Item = (S, Column)>>(iter: T) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(name, column)| (name.into(), column))
                .collect(),
        }
    }
}

/// Encodings of a batch and their aligned labels, one label list per encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizedBatch<E> {
    pub encodings: Vec<E>,
    pub labels: Vec<Vec<i64>>,
}

/// Tokenizes the input column of a batch and aligns the label column. Without an aligner the
/// labels are passed through unchanged.
#[derive(Debug, Clone)]
pub struct TokenizeAndAlign<T> {
    tokenizer: T,
    aligner: Option<LabelAligner>,
    input_column: String,
    label_column: String,
}

impl<T: BatchTokenizer> TokenizeAndAlign<T> {
    pub fn new(tokenizer: T, aligner: Option<LabelAligner>) -> Self {
        log::debug!(
            "Built a tokenize-and-align pipeline (aligner: {})",
            aligner.is_some()
        );
        Self {
            tokenizer,
            aligner,
            input_column: String::from(DEFAULT_INPUT_COLUMN),
            label_column: String::from(DEFAULT_LABEL_COLUMN),
        }
    }

    /// Builds the aligner and picks the column names from `config`.
    pub fn from_config(
        tokenizer: T,
        config: &TokenClassificationConfig,
    ) -> Result<Self, AlignmentError> {
        let aligner = LabelAligner::try_from(config)?;
        Ok(Self::new(tokenizer, Some(aligner))
            .with_columns(config.input_column(), config.label_column()))
    }

    pub fn with_columns(
        mut self,
        input_column: impl Into<String>,
        label_column: impl Into<String>,
    ) -> Self {
        self.input_column = input_column.into();
        self.label_column = label_column.into();
        self
    }

    pub fn tokenizer(&self) -> &T {
        &self.tokenizer
    }

    pub fn call(&self, batch: &Batch) -> Result<TokenizedBatch<T::Encoding>, AlignmentError> {
        let words = batch.words(&self.input_column)?;
        let encodings = self.tokenizer.tokenize_batch(words)?;
        let labels = batch.labels(&self.label_column)?;
        if labels.len() != encodings.len() {
            return Err(AlignmentError::BatchSizeMismatch {
                labels: labels.len(),
                encodings: encodings.len(),
            });
        }
        let labels = match &self.aligner {
            Some(aligner) => {
                let word_ids: Vec<Vec<Option<usize>>> =
                    encodings.iter().map(WordIds::word_ids).collect();
                aligner.align_batch(&labels[..], &word_ids)?
            }
            None => labels.into_owned(),
        };
        log::trace!("Tokenized and aligned a batch of {} examples", encodings.len());
        Ok(TokenizedBatch { encodings, labels })
    }
}

#[cfg(feature = "tokenizers")]
pub use hf::HfTokenizer;

#[cfg(feature = "tokenizers")]
mod hf {
    use super::{BatchTokenizer, WordIds};
    use crate::error::AlignmentError;
    use std::path::Path;
    use tokenizers::{Encoding, Tokenizer, TruncationParams};

    impl WordIds for Encoding {
        fn word_ids(&self) -> Vec<Option<usize>> {
            self.get_word_ids()
                .iter()
                .map(|id| id.map(|w| w as usize))
                .collect()
        }
    }

    fn tokenizer_error(error: tokenizers::Error) -> AlignmentError {
        AlignmentError::Tokenizer(error.to_string())
    }

    /// `BatchTokenizer` over a HuggingFace tokenizer. Words are encoded as pre-tokenized input,
    /// with the special tokens of the tokenizer.
    pub struct HfTokenizer {
        inner: Tokenizer,
    }

    impl HfTokenizer {
        /// Wraps `tokenizer`, truncating the encodings to `max_length` subwords (special tokens
        /// included) when given. With `None` the truncation settings of `tokenizer` are kept as
        /// they are: a tokenizer without truncation returns encodings of any length.
        pub fn new(mut tokenizer: Tokenizer, max_length: Option<usize>) -> Result<Self, AlignmentError> {
            if let Some(max_length) = max_length {
                tokenizer
                    .with_truncation(Some(TruncationParams {
                        max_length,
                        ..Default::default()
                    }))
                    .map_err(tokenizer_error)?;
            }
            Ok(Self { inner: tokenizer })
        }

        /// Loads a `tokenizer.json` file.
        pub fn from_file(
            path: impl AsRef<Path>,
            max_length: Option<usize>,
        ) -> Result<Self, AlignmentError> {
            let tokenizer = Tokenizer::from_file(path).map_err(tokenizer_error)?;
            Self::new(tokenizer, max_length)
        }
    }

    impl BatchTokenizer for HfTokenizer {
        type Encoding = Encoding;
        fn tokenize_batch(&self, words: &[Vec<String>]) -> Result<Vec<Encoding>, AlignmentError> {
            let inputs: Vec<Vec<&str>> = words
                .iter()
                .map(|example| example.iter().map(String::as_str).collect())
                .collect();
            self.inner.encode_batch(inputs, true).map_err(tokenizer_error)
        }
    }

}
