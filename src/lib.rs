//! Label alignment and evaluation for token classification (named entities, part-of-speech and
//! chunk tags) on subword-tokenized inputs.
//!
//! Subword tokenizers split words into several pieces, but datasets carry one label per word. The
//! [`LabelAligner`] gives every subword exactly one label, or the ignore sentinel for special
//! tokens. Under an IOB scheme, only the first subword of a word keeps its `B-` label and the
//! continuation subwords get the paired `I-` label.
//!
//! ```rust
//! use tokclass::{LabelAligner, LabelVocabulary};
//!
//! let vocabulary = LabelVocabulary::new(["O", "B-PER", "I-PER"]).unwrap();
//! let aligner = LabelAligner::new(Some(&vocabulary), true).unwrap();
//! // [CLS] Pet ##er said [SEP]
//! let word_ids = [None, Some(0), Some(0), Some(1), None];
//! assert_eq!(aligner.align(&[1, 0], &word_ids).unwrap(), vec![-100, 1, 2, 0, -100]);
//! ```
//!
//! Model outputs are scored by the metric computors: [`FlatMetric`] reduces the whole batch to
//! class ids, while [`NerMetric`] extracts entity spans the same way the SeqEval python library
//! does. The span-level scores are also available directly through [`classification_report`].
//!
//! ```rust
//! use tokclass::{classification_report, DivByZeroStrat, OverallAverage};
//!
//! let y_true = vec![vec!["O", "B-PER", "I-PER"], vec!["B-LOC", "O"]];
//! let y_pred = vec![vec!["O", "B-PER", "I-PER"], vec!["O", "O"]];
//! let reporter =
//!     classification_report(&y_true, &y_pred, DivByZeroStrat::ReplaceBy0, None, false, '-', false)
//!         .unwrap();
//! let micro = reporter.overall(OverallAverage::Micro).unwrap();
//! assert_eq!((micro.precision, micro.recall), (1.0, 0.5));
//! ```

mod aligner;
mod computor;
mod config;
mod entity;
mod error;
mod iob;
mod metrics;
mod reporter;
mod tokenize;
mod vocabulary;

pub use aligner::{align_labels, LabelAligner, DEFAULT_IGNORE_INDEX};
pub use computor::{
    ClassificationEvaluator, FlatMetric, MetricComputor, MetricScores, NerMetric,
    SequenceEvaluator,
};
pub use config::{
    MetricConfig, MetricConfigBuilder, TokenClassificationConfig, TokenClassificationConfigBuilder,
};
pub use entity::{get_entities_lenient, get_entities_strict, Entities, Entity, SchemeType};
pub use error::{
    AlignmentError, AutoDetectError, ComputationError, ConversionError, InvalidToken, LabelError,
    ParsingError,
};
pub use iob::IobMapping;
pub use metrics::{
    accuracy_score, classification_report, classification_report_conf,
    precision_recall_fscore_support, ClassificationScores, DivByZeroStrat, FloatExt,
    MacroClassification, ParsingDivisionByZeroStrategyError, PrecisionRecallFScoreTrueSum,
    SeqEval, SequenceReport,
};
pub use reporter::{Average, AverageParsingError, ClassMetrics, OverallAverage, Reporter};
#[cfg(feature = "tokenizers")]
pub use tokenize::HfTokenizer;
pub use tokenize::{Batch, BatchTokenizer, Column, TokenizeAndAlign, TokenizedBatch, WordIds};
pub use vocabulary::LabelVocabulary;
