/*!
Metric computors turn a batch of logits `(N, T, K)` and gold labels `(N, T)` into named scores.
Both computors take the arg-max over the label axis and drop the positions whose gold label is the
ignore sentinel before handing the remaining pairs to an evaluator:

* `FlatMetric` flattens the whole batch into two lists of class ids (`f1`, `accuracy`);
* `NerMetric` keeps the example boundaries and maps ids to label names, so entities can be
  extracted (`precision`, `recall`, `f1`, `accuracy`).
*/
use crate::aligner::DEFAULT_IGNORE_INDEX;
use crate::config::MetricConfig;
use crate::error::ComputationError;
use crate::metrics::{ClassificationScores, MacroClassification, SeqEval, SequenceReport};
use crate::vocabulary::LabelVocabulary;
use ndarray::prelude::*;
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Scores entity spans out of two lists of label sequences.
pub trait SequenceEvaluator {
    fn evaluate(
        &self,
        predictions: &[Vec<&str>],
        references: &[Vec<&str>],
    ) -> Result<SequenceReport, ComputationError>;
}

/// Scores two equal-length lists of class ids.
pub trait ClassificationEvaluator {
    fn evaluate(
        &self,
        predictions: &[i64],
        references: &[i64],
    ) -> Result<ClassificationScores, ComputationError>;
}

/// Reduces a batch of logits and gold labels to named scores.
pub trait MetricComputor {
    fn compute(
        &self,
        logits: ArrayView3<f32>,
        labels: ArrayView2<i64>,
    ) -> Result<MetricScores, ComputationError>;

    /// Same as `compute`, with the `(logits, labels)` pair returned by an evaluation loop.
    fn compute_pair(
        &self,
        pair: (ArrayView3<f32>, ArrayView2<i64>),
    ) -> Result<MetricScores, ComputationError> {
        let (logits, labels) = pair;
        self.compute(logits, labels)
    }
}

/// Named scores, such as `f1` or `accuracy`, in name order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricScores(BTreeMap<String, f32>);

impl MetricScores {
    pub fn get(&self, name: &str) -> Option<f32> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(name, score)| (name.as_str(), *score))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f32)> for MetricScores {
    fn from_iter<T: IntoIterator<Item = (S, f32)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, score)| (name.into(), score))
                .collect(),
        )
    }
}

impl From<MetricScores> for BTreeMap<String, f32> {
    fn from(value: MetricScores) -> Self {
        value.0
    }
}

impl Display for MetricScores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (name, score) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, score)?;
            first = false;
        }
        Ok(())
    }
}

fn check_shapes(logits: &ArrayView3<f32>, labels: &ArrayView2<i64>) -> Result<(), ComputationError> {
    let (n, t, k) = logits.dim();
    let (labels_n, labels_t) = labels.dim();
    if (n, t) != (labels_n, labels_t) {
        return Err(ComputationError::ShapeMismatch {
            logits: (n, t, k),
            labels: (labels_n, labels_t),
        });
    }
    Ok(())
}

/// Index of the largest logit of every position. Ties go to the first maximum.
fn argmax(logits: &ArrayView3<f32>) -> Result<Array2<usize>, ComputationError> {
    let (n, t, _) = logits.dim();
    let mut predictions = Array2::zeros((n, t));
    for (prediction, lane) in predictions.iter_mut().zip(logits.lanes(Axis(2))) {
        *prediction = lane.argmax()?;
    }
    Ok(predictions)
}

/// Kept `(prediction, gold)` pairs of every example, in position order.
fn masked_pairs(
    logits: &ArrayView3<f32>,
    labels: &ArrayView2<i64>,
    ignore_index: i64,
) -> Result<Vec<Vec<(usize, i64)>>, ComputationError> {
    check_shapes(logits, labels)?;
    let predictions = argmax(logits)?;
    let examples: Vec<Vec<(usize, i64)>> = predictions
        .outer_iter()
        .zip(labels.outer_iter())
        .map(|(preds, golds)| {
            preds
                .iter()
                .zip(golds.iter())
                .filter(|(_, gold)| **gold != ignore_index)
                .map(|(pred, gold)| (*pred, *gold))
                .collect()
        })
        .collect();
    if examples.iter().all(Vec::is_empty) {
        return Err(ComputationError::EmptyInput(String::from("labels")));
    }
    Ok(examples)
}

/// Flattens the kept pairs of the batch into the predicted and the gold class ids.
pub(crate) fn flat_reduction(
    logits: ArrayView3<f32>,
    labels: ArrayView2<i64>,
    ignore_index: i64,
) -> Result<(Vec<i64>, Vec<i64>), ComputationError> {
    Ok(masked_pairs(&logits, &labels, ignore_index)?
        .into_iter()
        .flatten()
        .map(|(pred, gold)| (pred as i64, gold))
        .unzip())
}

/// Flat token classification metric: f1 and accuracy over every kept position.
///
/// ```rust
/// use ndarray::{array, Array3};
/// use tokclass::{FlatMetric, MetricComputor};
///
/// let mut logits = Array3::<f32>::zeros((1, 3, 2));
/// logits[[0, 0, 1]] = 1.0;
/// let labels = array![[1, 0, -100]];
/// let scores = FlatMetric::default()
///     .compute(logits.view(), labels.view())
///     .unwrap();
/// assert_eq!(scores.get("accuracy"), Some(1.0));
/// assert_eq!(scores.get("f1"), Some(1.0));
/// ```
#[derive(Debug, Clone)]
pub struct FlatMetric<C = MacroClassification> {
    evaluator: C,
    ignore_index: i64,
}

impl Default for FlatMetric {
    fn default() -> Self {
        Self::with_evaluator(MacroClassification::default(), DEFAULT_IGNORE_INDEX)
    }
}

impl FlatMetric {
    pub fn new(config: &MetricConfig) -> Self {
        Self::with_evaluator(MacroClassification::from(config), config.ignore_index)
    }
}

impl<C: ClassificationEvaluator> FlatMetric<C> {
    /// Uses another evaluator than the default macro-averaged one.
    pub fn with_evaluator(evaluator: C, ignore_index: i64) -> Self {
        log::debug!("Built a flat metric (ignore index: {})", ignore_index);
        Self {
            evaluator,
            ignore_index,
        }
    }
}

impl<C: ClassificationEvaluator> MetricComputor for FlatMetric<C> {
    fn compute(
        &self,
        logits: ArrayView3<f32>,
        labels: ArrayView2<i64>,
    ) -> Result<MetricScores, ComputationError> {
        let (predictions, references) = flat_reduction(logits, labels, self.ignore_index)?;
        let scores = self.evaluator.evaluate(&predictions, &references)?;
        Ok(MetricScores::from_iter([
            ("f1", scores.f1),
            ("accuracy", scores.accuracy),
        ]))
    }
}

/// Span-level NER metric. Predictions and golds are mapped to label names through the vocabulary,
/// then scored per entity by the sequence evaluator.
///
/// Label names must start with one of the `I O B E S U L` prefixes. Unlike SeqEval, which takes
/// any first character as the prefix, a vocabulary of plain tags (part-of-speech tags such as
/// `NN`) fails with `ComputationError::Parsing`; score such tasks with `FlatMetric`.
#[derive(Debug, Clone)]
pub struct NerMetric<E = SeqEval> {
    evaluator: E,
    vocabulary: LabelVocabulary,
    ignore_index: i64,
}

impl NerMetric {
    pub fn new(vocabulary: LabelVocabulary, config: &MetricConfig) -> Self {
        Self::with_evaluator(SeqEval::from(config), vocabulary, config.ignore_index)
    }
}

impl<E: SequenceEvaluator> NerMetric<E> {
    pub fn with_evaluator(evaluator: E, vocabulary: LabelVocabulary, ignore_index: i64) -> Self {
        log::debug!(
            "Built a NER metric over {} labels (ignore index: {})",
            vocabulary.len(),
            ignore_index
        );
        Self {
            evaluator,
            vocabulary,
            ignore_index,
        }
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    /// Predicted and gold label names of every example, ignored positions removed.
    fn name_sequences(
        &self,
        logits: &ArrayView3<f32>,
        labels: &ArrayView2<i64>,
    ) -> Result<(Vec<Vec<&str>>, Vec<Vec<&str>>), ComputationError> {
        let (_, _, k) = logits.dim();
        if k != self.vocabulary.len() {
            return Err(ComputationError::VocabularySizeMismatch {
                logits: k,
                vocabulary: self.vocabulary.len(),
            });
        }
        let examples = masked_pairs(logits, labels, self.ignore_index)?;
        let mut predictions = Vec::with_capacity(examples.len());
        let mut references = Vec::with_capacity(examples.len());
        for example in examples {
            let mut prediction = Vec::with_capacity(example.len());
            let mut reference = Vec::with_capacity(example.len());
            for (pred, gold) in example {
                reference.push(
                    self.vocabulary
                        .name_of(gold)
                        .ok_or(ComputationError::UnknownLabelId(gold))?,
                );
                prediction.push(
                    self.vocabulary
                        .name_of(pred)
                        .ok_or(ComputationError::UnknownLabelId(pred as i64))?,
                );
            }
            predictions.push(prediction);
            references.push(reference);
        }
        Ok((predictions, references))
    }

    /// Full report, per-class table included.
    pub fn report(
        &self,
        logits: ArrayView3<f32>,
        labels: ArrayView2<i64>,
    ) -> Result<SequenceReport, ComputationError> {
        let (predictions, references) = self.name_sequences(&logits, &labels)?;
        self.evaluator.evaluate(&predictions, &references)
    }
}

impl<E: SequenceEvaluator> MetricComputor for NerMetric<E> {
    fn compute(
        &self,
        logits: ArrayView3<f32>,
        labels: ArrayView2<i64>,
    ) -> Result<MetricScores, ComputationError> {
        let report = self.report(logits, labels)?;
        Ok(MetricScores::from_iter([
            ("precision", report.precision),
            ("recall", report.recall),
            ("f1", report.f1),
            ("accuracy", report.accuracy),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParsingError;
    use crate::metrics::tests::assert_close;
    use crate::vocabulary::tests::conll_vocabulary;
    use quickcheck::{QuickCheck, TestResult};
    use rstest::rstest;

    /// Logits whose arg-max is `predictions`.
    fn logits_of(predictions: &[Vec<usize>], num_labels: usize) -> Array3<f32> {
        let n = predictions.len();
        let t = predictions.first().map(Vec::len).unwrap_or(0);
        let mut logits = Array3::zeros((n, t, num_labels));
        for (i, example) in predictions.iter().enumerate() {
            for (j, pred) in example.iter().enumerate() {
                logits[[i, j, *pred]] = 1.0;
            }
        }
        logits
    }

    #[test]
    fn test_flat_metric() {
        let logits = logits_of(&[vec![1, 0, 2], vec![0, 1, 1]], 3);
        let labels = array![[1, 0, -100], [0, 2, -100]];
        let scores = FlatMetric::default()
            .compute(logits.view(), labels.view())
            .unwrap();
        assert_close(scores.get("f1").unwrap(), (1.0 + 2.0 / 3.0) / 3.0);
        assert_close(scores.get("accuracy").unwrap(), 0.75);
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn test_flat_reduction_drops_ignored_positions() {
        let logits = logits_of(&[vec![1, 0, 2], vec![0, 1, 1]], 3);
        let labels = array![[1, -100, -100], [0, 2, -100]];
        let (predictions, references) =
            flat_reduction(logits.view(), labels.view(), DEFAULT_IGNORE_INDEX).unwrap();
        assert_eq!(predictions, vec![1, 0, 1]);
        assert_eq!(references, vec![1, 0, 2]);
    }

    #[rstest]
    #[case(array![[-100, -100], [-100, -100]])]
    #[case(Array2::zeros((0, 2)))]
    fn test_empty_reduction(#[case] labels: Array2<i64>) {
        let (n, t) = labels.dim();
        let logits = Array3::<f32>::zeros((n, t, 9));
        let expected = Err(ComputationError::EmptyInput(String::from("labels")));
        assert_eq!(
            FlatMetric::default().compute(logits.view(), labels.view()),
            expected
        );
        let ner = NerMetric::new(conll_vocabulary(), &MetricConfig::default());
        assert_eq!(ner.compute(logits.view(), labels.view()), expected);
    }

    #[test]
    fn test_shape_mismatch() {
        let logits = Array3::<f32>::zeros((2, 3, 4));
        let labels = Array2::<i64>::zeros((2, 2));
        assert_eq!(
            FlatMetric::default().compute(logits.view(), labels.view()),
            Err(ComputationError::ShapeMismatch {
                logits: (2, 3, 4),
                labels: (2, 2)
            })
        );
    }

    #[test]
    fn test_nan_logits() {
        let mut logits = Array3::<f32>::zeros((1, 2, 3));
        logits[[0, 1, 1]] = f32::NAN;
        let labels = array![[0, 1]];
        let actual = FlatMetric::default().compute(logits.view(), labels.view());
        assert!(matches!(actual, Err(ComputationError::Argmax(_))));
    }

    #[test]
    fn test_ner_metric_perfect() {
        // O B-PER I-PER O, the last prediction is on an ignored position
        let logits = logits_of(&[vec![0, 1, 2, 0, 5]], 9);
        let labels = array![[0, 1, 2, 0, -100]];
        let ner = NerMetric::new(conll_vocabulary(), &MetricConfig::default());
        let scores = ner.compute(logits.view(), labels.view()).unwrap();
        for name in ["precision", "recall", "f1", "accuracy"] {
            assert_eq!(scores.get(name), Some(1.0), "{}", name);
        }
    }

    #[test]
    fn test_ner_metric_report() {
        // gold: B-PER I-PER O B-LOC | pred: B-PER I-PER O O
        let logits = logits_of(&[vec![1, 2, 0, 0]], 9);
        let labels = array![[1, 2, 0, 5]];
        let ner = NerMetric::new(conll_vocabulary(), &MetricConfig::default());
        let report = ner.report(logits.view(), labels.view()).unwrap();
        assert_close(report.precision, 1.0);
        assert_close(report.recall, 0.5);
        assert_close(report.f1, 2.0 / 3.0);
        assert_close(report.accuracy, 0.75);
        assert_eq!(report.reporter.class("LOC").unwrap().recall, 0.0);
    }

    #[test]
    fn test_ner_metric_strict_scheme() {
        // I-PER without a begin label is not an IOB2 entity
        let logits = logits_of(&[vec![2, 0]], 9);
        let labels = array![[2, 0]];
        let config = MetricConfig::builder()
            .scheme(crate::entity::SchemeType::IOB2)
            .build();
        let ner = NerMetric::new(conll_vocabulary(), &config);
        let report = ner.report(logits.view(), labels.view()).unwrap();
        assert_eq!(report.reporter.classes().count(), 0);
        assert_eq!(report.accuracy, 1.0);
    }

    #[test]
    fn test_ner_vocabulary_size_mismatch() {
        let logits = Array3::<f32>::zeros((1, 2, 3));
        let labels = array![[0, 1]];
        let ner = NerMetric::new(conll_vocabulary(), &MetricConfig::default());
        assert_eq!(
            ner.compute(logits.view(), labels.view()),
            Err(ComputationError::VocabularySizeMismatch {
                logits: 3,
                vocabulary: 9
            })
        );
    }

    #[test]
    fn test_ner_unknown_label_id() {
        let logits = Array3::<f32>::zeros((1, 2, 9));
        let labels = array![[0, 42]];
        let ner = NerMetric::new(conll_vocabulary(), &MetricConfig::default());
        assert_eq!(
            ner.compute(logits.view(), labels.view()),
            Err(ComputationError::UnknownLabelId(42))
        );
    }

    #[test]
    fn test_ner_metric_rejects_plain_tags() {
        let vocabulary = LabelVocabulary::new(["NN", "VB"]).unwrap();
        let logits = logits_of(&[vec![0, 1]], 2);
        let labels = array![[0, 1]];
        let ner = NerMetric::new(vocabulary, &MetricConfig::default());
        assert_eq!(
            ner.compute(logits.view(), labels.view()),
            Err(ComputationError::Parsing(ParsingError::PrefixError(
                String::from("N")
            )))
        );
        let flat = FlatMetric::default();
        assert_eq!(
            flat.compute(logits.view(), labels.view()).unwrap().get("f1"),
            Some(1.0)
        );
    }

    #[test]
    fn test_computors_are_object_safe() {
        let computors: Vec<Box<dyn MetricComputor>> = vec![
            Box::new(FlatMetric::default()),
            Box::new(NerMetric::new(conll_vocabulary(), &MetricConfig::default())),
        ];
        let logits = logits_of(&[vec![0, 1, 2]], 9);
        let labels = array![[0, 1, 2]];
        for computor in computors {
            let scores = computor.compute_pair((logits.view(), labels.view())).unwrap();
            assert_eq!(scores.get("f1"), Some(1.0));
        }
    }

    #[test]
    fn test_metric_scores_display() {
        let scores = MetricScores::from_iter([("f1", 0.5), ("accuracy", 1.0)]);
        assert_eq!(scores.to_string(), "accuracy: 1, f1: 0.5");
    }

    #[test]
    fn test_propertie_flat_reduction_is_sentinel_free() {
        fn flat_reduction_is_sentinel_free(positions: Vec<(u8, u8)>) -> TestResult {
            let num_labels = 4;
            let golds: Vec<i64> = positions
                .iter()
                .map(|(gold, _)| match gold % 5 {
                    4 => DEFAULT_IGNORE_INDEX,
                    g => g as i64,
                })
                .collect();
            let preds: Vec<usize> = positions
                .iter()
                .map(|(_, pred)| (pred % num_labels as u8) as usize)
                .collect();
            let kept = golds.iter().filter(|g| **g != DEFAULT_IGNORE_INDEX).count();
            let logits = logits_of(&[preds], num_labels);
            let labels = Array2::from_shape_vec((1, golds.len()), golds).unwrap();
            match flat_reduction(logits.view(), labels.view(), DEFAULT_IGNORE_INDEX) {
                Err(ComputationError::EmptyInput(_)) => TestResult::from_bool(kept == 0),
                Err(_) => TestResult::failed(),
                Ok((predictions, references)) => TestResult::from_bool(
                    predictions.len() == kept
                        && references.len() == kept
                        && !references.contains(&DEFAULT_IGNORE_INDEX),
                ),
            }
        }
        let mut qc = QuickCheck::new().tests(1000);
        qc.quickcheck(flat_reduction_is_sentinel_free as fn(Vec<(u8, u8)>) -> TestResult)
    }
}
