//! Error types of the crate. Each stage has its own enum: building label vocabularies
//! (`LabelError`), aligning labels to subwords (`AlignmentError`), parsing tags into entities
//! (`ParsingError`, `InvalidToken`) and computing metrics (`ComputationError`).

use ndarray_stats::errors::{MinMaxError, MultiInputError};
use thiserror::Error;

/// Errors raised while building a label vocabulary or an IOB mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    /// The same label name appears twice. Positional ids would be ambiguous.
    #[error("label `{name}` appears more than once in the vocabulary (positions {first} and {second})")]
    DuplicateLabel {
        name: String,
        first: usize,
        second: usize,
    },
    /// Only returned by the strict IOB mapping builder.
    #[error("begin labels without a matching inside label: {0:?}")]
    UnpairedBeginLabels(Vec<String>),
}

/// Errors raised while aligning word-level labels to subwords.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignmentError {
    /// The word-index map points past the end of the word-level labels.
    #[error("subword at position {position} references word {word_index}, but only {num_words} word labels were given")]
    WordIndexOutOfRange {
        position: usize,
        word_index: usize,
        num_words: usize,
    },
    /// IOB handling needs the label names to pair `B-` and `I-` labels.
    #[error("label names must be provided when IOB handling is enabled")]
    MissingLabelNames,
    #[error("column `{0}` is missing from the batch")]
    ColumnNotFound(String),
    #[error("column `{column}` does not hold {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
    },
    #[error("the batch holds {labels} label sequences but the tokenizer returned {encodings} encodings")]
    BatchSizeMismatch { labels: usize, encodings: usize },
    /// Failure reported by the tokenizer collaborator.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Could not parse the string into a `Prefix`
pub enum ParsingError {
    #[error("Could not parse the following string into a Prefix: {0}")]
    PrefixError(String),
    #[error("Received an empty string/&str")]
    EmptyToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Encoutered a token whose prefix is not allowed by the scheme.
#[error("Invalid token: {0}")]
pub struct InvalidToken(pub(crate) String);

/// Failures of the strict entity parser: a token could not be parsed or its prefix is not allowed
/// by the scheme.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error(transparent)]
    InvalidToken(#[from] InvalidToken),
    #[error(transparent)]
    Parsing(#[from] ParsingError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutoDetectError {
    #[error("No scheme accepts the following prefixes: {0:?}")]
    NoSchemeParsed(Vec<char>),
    #[error(transparent)]
    Parsing(#[from] ParsingError),
}

/// Enum error encompassing the failures that can happen when reducing predictions and gold labels
/// into scores.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputationError {
    #[error("Beta value is not positive")]
    BetaNotPositive,
    #[error("Inconsistent length between two lists. `y_true` is length {0}, `y_pred` is length {1}")]
    InconsistentLength(usize, usize),
    /// Logits and labels disagree on the batch or sequence dimension.
    #[error("logits have shape {logits:?} but labels have shape {labels:?}")]
    ShapeMismatch {
        logits: (usize, usize, usize),
        labels: (usize, usize),
    },
    /// The last axis of the logits must have one entry per vocabulary label.
    #[error("logits have {logits} classes but the label vocabulary holds {vocabulary} labels")]
    VocabularySizeMismatch { logits: usize, vocabulary: usize },
    #[error("label id {0} is not part of the label vocabulary")]
    UnknownLabelId(i64),
    #[error("Received an empty input {0}")]
    EmptyInput(String),
    #[error(transparent)]
    Parsing(#[from] ParsingError),
    #[error(transparent)]
    InvalidToken(#[from] InvalidToken),
    #[error("Encountered division by zero")]
    DivisionByZero,
    #[error("arg-max over logits failed: {0}")]
    Argmax(#[from] MinMaxError),
    #[error("weighted mean failed: {0}")]
    WeightedMean(#[from] MultiInputError),
}

impl From<ConversionError> for ComputationError {
    fn from(value: ConversionError) -> Self {
        match value {
            ConversionError::InvalidToken(t) => Self::InvalidToken(t),
            ConversionError::Parsing(p) => Self::Parsing(p),
        }
    }
}
