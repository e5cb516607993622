/*!
This module computes the metrics (precision, recall, f-score, support) of a ground-truth
sequence and a predicted sequence. It holds the two evaluators used by the metric computors:

* `SeqEval` scores entity spans, like the SeqEval python library;
* `MacroClassification` scores flat class ids, like scikit-learn's `f1_score` and
  `accuracy_score`.
*/
use crate::computor::{ClassificationEvaluator, SequenceEvaluator};
use crate::config::MetricConfig;
use crate::entity::{get_entities_lenient, get_entities_strict, Entities, SchemeType};
use crate::error::ComputationError;
use crate::reporter::{Average, ClassMetricsInner, OverallAverage, Reporter};
use ahash::{AHashMap, AHashSet};
use itertools::multizip;
use ndarray::{prelude::*, Zip};
use ndarray_stats::SummaryStatisticsExt;
use num::{Float, FromPrimitive};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// How do we handle cases with a division by zero? Do we return 0, return 1 or return an error?
/// SeqEval and scikit-learn use by default the `ReplaceBy0` strategy. It is not recommended to
/// use the `ReturnError`; it will stop the computation. It can be useful if you believe there
/// should be no 0 in the denominator.
pub enum DivByZeroStrat {
    /// Returns 0 when the denominator is 0
    #[default]
    ReplaceBy0,
    /// Returns 1 when the denominator is 0
    ReplaceBy1,
    /// Returns an error
    ReturnError,
}

impl DivByZeroStrat {
    /// Value given to an undefined ratio, or `None` when the strategy is to fail.
    fn fill<F: Float>(&self) -> Option<F> {
        match self {
            Self::ReplaceBy0 => Some(F::zero()),
            Self::ReplaceBy1 => Some(F::one()),
            Self::ReturnError => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not parse the {0} into a a `DivByZeroStrat`")]
pub struct ParsingDivisionByZeroStrategyError(String);

impl FromStr for DivByZeroStrat {
    type Err = ParsingDivisionByZeroStrategyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "replaceby0" | "replacebyzero" | "zero" => Ok(DivByZeroStrat::ReplaceBy0),
            "replaceby1" | "replacebyone" | "one" => Ok(DivByZeroStrat::ReplaceBy1),
            "returnerror" | "error" => Ok(DivByZeroStrat::ReturnError),
            _ => Err(ParsingDivisionByZeroStrategyError(String::from(s))),
        }
    }
}

/// Internal extension trait for Num's Float trait
pub trait FloatExt: Float + FromPrimitive + Send + Sync + Debug {}

impl<T: Float + FromPrimitive + Send + Sync + Debug> FloatExt for T {}

/// Floats represent every count, possibly rounded.
#[inline]
fn cast<F: FloatExt>(count: usize) -> F {
    F::from_usize(count).unwrap_or_else(F::infinity)
}

/// Element-wise division. Where the denominator is zero, the result follows `zero_division`.
fn prf_divide<F: FloatExt>(
    numerator: ArrayView1<F>,
    denominator: ArrayView1<F>,
    parallel: bool,
    zero_division: DivByZeroStrat,
) -> Result<Array1<F>, ComputationError> {
    let fill = match zero_division.fill::<F>() {
        Some(value) => value,
        None if denominator.iter().any(|d| d.is_zero()) => {
            return Err(ComputationError::DivisionByZero)
        }
        None => F::zero(),
    };
    let mut result = Array1::zeros(numerator.raw_dim());
    let zip = Zip::from(&mut result).and(numerator).and(denominator);
    let divide = |r: &mut F, &n: &F, &d: &F| *r = if d.is_zero() { fill } else { n / d };
    if parallel {
        zip.par_for_each(divide);
    } else {
        zip.for_each(divide);
    }
    Ok(result)
}

/// F-beta from precision and recall. A zero denominator gives a zero score.
fn fbeta<F: FloatExt>(
    precision: &Array1<F>,
    recall: &Array1<F>,
    beta2: F,
    parallel: bool,
) -> Array1<F> {
    let zip = Zip::from(precision).and(recall);
    let score = |&p: &F, &r: &F| {
        let denominator = beta2 * p + r;
        if denominator.is_zero() {
            F::zero()
        } else {
            (F::one() + beta2) * p * r / denominator
        }
    };
    if parallel {
        zip.par_map_collect(score)
    } else {
        zip.map_collect(score)
    }
}

fn check_for_empty_slices<T>(y_true: &[T], y_pred: &[T]) -> Result<(), ComputationError> {
    if y_true.is_empty() {
        return Err(ComputationError::EmptyInput(String::from("y_true")));
    };
    if y_pred.is_empty() {
        return Err(ComputationError::EmptyInput(String::from("y_pred")));
    };
    Ok(())
}

fn check_consistent_length<T>(y_true: &[Vec<T>], y_pred: &[Vec<T>]) -> Result<(), ComputationError> {
    if y_true.len() != y_pred.len() {
        return Err(ComputationError::InconsistentLength(
            y_true.len(),
            y_pred.len(),
        ));
    }
    for (t, p) in y_true.iter().zip(y_pred) {
        if t.len() != p.len() {
            return Err(ComputationError::InconsistentLength(t.len(), p.len()));
        }
    }
    Ok(())
}

/// predicted sum, true positive sum and true sum
type ActualTPCorrect = (Array1<usize>, Array1<usize>, Array1<usize>);

/// Counts, for every tag found in either entity set, the predicted, correct and true entities.
/// Tags are returned in ascending order.
fn extract_tp_actual_correct<'a>(
    entities_true: &Entities<'a>,
    entities_pred: &Entities<'a>,
) -> (Vec<&'a str>, ActualTPCorrect) {
    let true_spans = entities_true.spans_by_tag();
    let pred_spans = entities_pred.spans_by_tag();
    let target_names: BTreeSet<&'a str> = true_spans
        .keys()
        .chain(pred_spans.keys())
        .copied()
        .collect();
    let empty = AHashSet::default();
    let mut pred_sum = Vec::with_capacity(target_names.len());
    let mut tp_sum = Vec::with_capacity(target_names.len());
    let mut true_sum = Vec::with_capacity(target_names.len());
    for name in target_names.iter() {
        let true_set = true_spans.get(name).unwrap_or(&empty);
        let pred_set = pred_spans.get(name).unwrap_or(&empty);
        pred_sum.push(pred_set.len());
        tp_sum.push(true_set.intersection(pred_set).count());
        true_sum.push(true_set.len());
    }
    (
        target_names.into_iter().collect(),
        (
            Array::from(pred_sum),
            Array::from(tp_sum),
            Array::from(true_sum),
        ),
    )
}

/// Type alias for representing the output of the `precision_recall_fscore_support`. The first
/// array contains the precision, the second the recall, the third the f-score and the last one
/// the support. Averaged outputs hold a single element.
pub type PrecisionRecallFScoreTrueSum<F = f32> = (Array1<F>, Array1<F>, Array1<F>, Array1<usize>);

/// Computes the precision, recall, f-score and support from the per-class counts.
///
/// * `pred_sum`: Number of predictions of each class.
/// * `tp_sum`: Number of correct predictions of each class.
/// * `true_sum`: Number of true occurrences of each class.
/// * `beta`: Value of the `beta` parameter of the fscore. `beta=1` for F1 and `beta=0.5` for F0.5.
/// * `average`: What type of average to use.
/// * `zero_division`: What to do in case of division by zero.
/// * `parallel`: Can we use multiple cores for the element-wise computations?
///
/// ```rust
/// use ndarray::array;
/// use tokclass::{precision_recall_fscore_support, Average, DivByZeroStrat};
///
/// let (p, r, f, s) = precision_recall_fscore_support(
///     array![1, 1].view(),
///     array![0, 1].view(),
///     array![1, 1].view(),
///     1.0_f32,
///     Average::Macro,
///     DivByZeroStrat::ReplaceBy0,
///     false,
/// )
/// .unwrap();
/// assert_eq!((p[0], r[0], f[0], s[0]), (0.5, 0.5, 0.5, 2));
/// ```
pub fn precision_recall_fscore_support<F: FloatExt>(
    pred_sum: ArrayView1<usize>,
    tp_sum: ArrayView1<usize>,
    true_sum: ArrayView1<usize>,
    beta: F,
    average: Average,
    zero_division: DivByZeroStrat,
    parallel: bool,
) -> Result<PrecisionRecallFScoreTrueSum<F>, ComputationError> {
    if beta < F::zero() {
        return Err(ComputationError::BetaNotPositive);
    };
    let (pred_sum, tp_sum, true_sum) = if matches!(average, Average::Micro) {
        (
            array![pred_sum.sum()],
            array![tp_sum.sum()],
            array![true_sum.sum()],
        )
    } else {
        (pred_sum.to_owned(), tp_sum.to_owned(), true_sum.to_owned())
    };
    let tp = tp_sum.mapv(cast::<F>);
    let precision = prf_divide(
        tp.view(),
        pred_sum.mapv(cast::<F>).view(),
        parallel,
        zero_division,
    )?;
    let recall = prf_divide(
        tp.view(),
        true_sum.mapv(cast::<F>).view(),
        parallel,
        zero_division,
    )?;
    let beta2 = beta.powi(2);
    let f_score = if beta2.is_infinite() {
        recall.clone()
    } else {
        fbeta(&precision, &recall, beta2, parallel)
    };
    match average {
        Average::None | Average::Micro => Ok((precision, recall, f_score, true_sum)),
        Average::Macro => {
            let support = true_sum.sum();
            match (precision.mean(), recall.mean(), f_score.mean()) {
                (Some(p), Some(r), Some(f)) => Ok((array![p], array![r], array![f], array![support])),
                _ => undefined_average(zero_division, support),
            }
        }
        Average::Weighted => {
            let support = true_sum.sum();
            if support == 0 {
                return undefined_average(zero_division, support);
            }
            let weights = true_sum.mapv(cast::<F>);
            Ok((
                array![precision.weighted_mean(&weights)?],
                array![recall.weighted_mean(&weights)?],
                array![f_score.weighted_mean(&weights)?],
                array![support],
            ))
        }
    }
}

/// Average over no class, or over classes without support.
fn undefined_average<F: FloatExt>(
    zero_division: DivByZeroStrat,
    support: usize,
) -> Result<PrecisionRecallFScoreTrueSum<F>, ComputationError> {
    let fill = zero_division
        .fill::<F>()
        .ok_or(ComputationError::DivisionByZero)?;
    Ok((array![fill], array![fill], array![fill], array![support]))
}

fn item<A: Copy>(array: &Array1<A>) -> Result<A, ComputationError> {
    array
        .first()
        .copied()
        .ok_or_else(|| ComputationError::EmptyInput(String::from("average")))
}

/// Main entrypoint of the span-level metrics. This function computes the precision, recall,
/// fscore and support of the true and predicted tokens. It returns information about the
/// individual classes and the micro, macro and weighted averages. The returned structure can be
/// used to prettyprint the results or be converted into a HashSet.
///
/// * `y_true`: True tokens
/// * `y_pred`: Predicted tokens
/// * `zero_division`: What to do in case of division by zero.
/// * `scheme`: Strict mode when given, conlleval (lenient) mode otherwise.
/// * `suffix`: Is the prefix located at the end of the tokens?
/// * `delimiter`: Character between the prefix and the tag.
/// * `parallel`: Can we use multiple cores for the element-wise computations?
pub fn classification_report(
    y_true: &[Vec<&str>],
    y_pred: &[Vec<&str>],
    zero_division: DivByZeroStrat,
    scheme: Option<SchemeType>,
    suffix: bool,
    delimiter: char,
    parallel: bool,
) -> Result<Reporter, ComputationError> {
    check_consistent_length(y_true, y_pred)?;
    check_for_empty_slices(y_true, y_pred)?;
    let (entities_true, entities_pred) = match scheme {
        Some(scheme) => (
            get_entities_strict(y_true, scheme, suffix, delimiter)?,
            get_entities_strict(y_pred, scheme, suffix, delimiter)?,
        ),
        None => (
            get_entities_lenient(y_true, suffix, delimiter)?,
            get_entities_lenient(y_pred, suffix, delimiter)?,
        ),
    };
    let (target_names, (pred_sum, tp_sum, true_sum)) =
        extract_tp_actual_correct(&entities_true, &entities_pred);
    log::trace!(
        "Scoring {} true and {} predicted entities over {} classes",
        entities_true.len(),
        entities_pred.len(),
        target_names.len()
    );
    let mut reporter = Reporter::default();
    let (p, r, f1, s) = precision_recall_fscore_support(
        pred_sum.view(),
        tp_sum.view(),
        true_sum.view(),
        1.0_f32,
        Average::None,
        zero_division,
        parallel,
    )?;
    for (name, precision, recall, fscore, support) in
        multizip((target_names.iter(), p.iter(), r.iter(), f1.iter(), s.iter()))
    {
        reporter.insert(ClassMetricsInner::new_class(
            name, *precision, *recall, *fscore, *support,
        ));
    }
    for avg in OverallAverage::ALL {
        let (p, r, f1, s) = precision_recall_fscore_support(
            pred_sum.view(),
            tp_sum.view(),
            true_sum.view(),
            1.0_f32,
            avg.into(),
            zero_division,
            parallel,
        )?;
        reporter.insert(ClassMetricsInner::new_overall(
            avg,
            item(&p)?,
            item(&r)?,
            item(&f1)?,
            item(&s)?,
        ));
    }
    Ok(reporter)
}

/// Computes the `classification_report` with the parameters of a `MetricConfig`.
pub fn classification_report_conf(
    y_true: &[Vec<&str>],
    y_pred: &[Vec<&str>],
    config: &MetricConfig,
) -> Result<Reporter, ComputationError> {
    classification_report(
        y_true,
        y_pred,
        config.zero_division,
        config.scheme,
        config.suffix,
        config.delimiter,
        config.parallel,
    )
}

/// Token accuracy over every position of every sequence.
pub fn accuracy_score<T: PartialEq>(
    y_true: &[Vec<T>],
    y_pred: &[Vec<T>],
) -> Result<f32, ComputationError> {
    check_consistent_length(y_true, y_pred)?;
    let total: usize = y_true.iter().map(Vec::len).sum();
    if total == 0 {
        return Err(ComputationError::EmptyInput(String::from("y_true")));
    }
    let correct = y_true
        .iter()
        .flatten()
        .zip(y_pred.iter().flatten())
        .filter(|(t, p)| t == p)
        .count();
    Ok(correct as f32 / total as f32)
}

/// Output of a `SequenceEvaluator`: the overall micro-averaged scores, the token accuracy and the
/// per-class table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceReport {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub accuracy: f32,
    pub reporter: Reporter,
}

/// Span-level evaluator following the SeqEval python library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqEval {
    zero_division: DivByZeroStrat,
    scheme: Option<SchemeType>,
    suffix: bool,
    delimiter: char,
    parallel: bool,
}

impl Default for SeqEval {
    fn default() -> Self {
        Self {
            zero_division: DivByZeroStrat::ReplaceBy0,
            scheme: None,
            suffix: false,
            delimiter: '-',
            parallel: false,
        }
    }
}

impl From<&MetricConfig> for SeqEval {
    fn from(config: &MetricConfig) -> Self {
        Self {
            zero_division: config.zero_division,
            scheme: config.scheme,
            suffix: config.suffix,
            delimiter: config.delimiter,
            parallel: config.parallel,
        }
    }
}

impl SequenceEvaluator for SeqEval {
    fn evaluate(
        &self,
        predictions: &[Vec<&str>],
        references: &[Vec<&str>],
    ) -> Result<SequenceReport, ComputationError> {
        let reporter = classification_report(
            references,
            predictions,
            self.zero_division,
            self.scheme,
            self.suffix,
            self.delimiter,
            self.parallel,
        )?;
        let micro = reporter
            .overall(OverallAverage::Micro)
            .ok_or_else(|| ComputationError::EmptyInput(String::from("micro average")))?;
        let accuracy = accuracy_score(references, predictions)?;
        Ok(SequenceReport {
            precision: micro.precision,
            recall: micro.recall,
            f1: micro.fscore,
            accuracy,
            reporter,
        })
    }
}

/// Output of a `ClassificationEvaluator`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationScores {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub accuracy: f32,
    pub support: usize,
}

/// Flat evaluator over class ids. The classes are the union of the predicted and true ids. The
/// average is macro by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacroClassification {
    average: OverallAverage,
    zero_division: DivByZeroStrat,
    parallel: bool,
}

impl MacroClassification {
    pub fn new(average: OverallAverage, zero_division: DivByZeroStrat) -> Self {
        Self {
            average,
            zero_division,
            parallel: false,
        }
    }
}

impl From<&MetricConfig> for MacroClassification {
    fn from(config: &MetricConfig) -> Self {
        Self {
            average: config.average,
            zero_division: config.zero_division,
            parallel: config.parallel,
        }
    }
}

/// Per-class counts of flat predictions, classes in ascending order.
fn class_counts(predictions: &[i64], references: &[i64]) -> ActualTPCorrect {
    let classes: BTreeSet<i64> = predictions.iter().chain(references).copied().collect();
    let index: AHashMap<i64, usize> = classes
        .iter()
        .enumerate()
        .map(|(i, class)| (*class, i))
        .collect();
    let mut pred_sum = Array1::zeros(classes.len());
    let mut tp_sum = Array1::zeros(classes.len());
    let mut true_sum = Array1::zeros(classes.len());
    for (p, t) in predictions.iter().zip(references) {
        pred_sum[index[p]] += 1;
        true_sum[index[t]] += 1;
        if p == t {
            tp_sum[index[t]] += 1;
        }
    }
    (pred_sum, tp_sum, true_sum)
}

impl ClassificationEvaluator for MacroClassification {
    fn evaluate(
        &self,
        predictions: &[i64],
        references: &[i64],
    ) -> Result<ClassificationScores, ComputationError> {
        if predictions.len() != references.len() {
            return Err(ComputationError::InconsistentLength(
                references.len(),
                predictions.len(),
            ));
        }
        check_for_empty_slices(references, predictions)?;
        let (pred_sum, tp_sum, true_sum) = class_counts(predictions, references);
        let (p, r, f1, s) = precision_recall_fscore_support(
            pred_sum.view(),
            tp_sum.view(),
            true_sum.view(),
            1.0_f32,
            self.average.into(),
            self.zero_division,
            self.parallel,
        )?;
        let accuracy = tp_sum.sum() as f32 / references.len() as f32;
        Ok(ClassificationScores {
            precision: item(&p)?,
            recall: item(&r)?,
            f1: item(&f1)?,
            accuracy,
            support: item(&s)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::reporter::ClassMetrics;
    use rstest::rstest;
    use std::collections::HashSet;

    pub(crate) fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "{} is not close to {}",
            actual,
            expected
        );
    }

    fn seqeval_example() -> (Vec<Vec<&'static str>>, Vec<Vec<&'static str>>) {
        let y_true = vec![
            vec!["O", "O", "O", "B-MISC", "I-MISC", "I-MISC", "O"],
            vec!["B-PER", "I-PER", "O"],
        ];
        let y_pred = vec![
            vec!["O", "O", "B-MISC", "I-MISC", "I-MISC", "I-MISC", "O"],
            vec!["B-PER", "I-PER", "O"],
        ];
        (y_true, y_pred)
    }

    #[test]
    fn test_reporter_output() {
        let y_true = vec![vec!["B-A", "B-B", "O", "B-A"]];
        let y_pred = vec![vec!["O", "B-B", "B-C", "B-A"]];
        let actual = classification_report(
            &y_true,
            &y_pred,
            DivByZeroStrat::ReplaceBy0,
            Some(SchemeType::IOB2),
            false,
            '-',
            false,
        )
        .unwrap();
        let expected = [
            ("A", Average::None, 1.0, 0.5, 0.6666667, 2),
            ("B", Average::None, 1.0, 1.0, 1.0, 1),
            ("C", Average::None, 0.0, 0.0, 0.0, 0),
            ("Overall_Macro", Average::Macro, 0.6666667, 0.5, 0.5555556, 3),
            ("Overall_Micro", Average::Micro, 0.6666667, 0.6666667, 0.6666667, 3),
            ("Overall_Weighted", Average::Weighted, 1.0, 0.6666667, 0.7777778, 3),
        ];
        let actual: HashSet<ClassMetrics> = actual.into();
        assert_eq!(actual.len(), expected.len());
        for (class, average, precision, recall, fscore, support) in expected {
            let found = actual
                .iter()
                .find(|m| m.class == class && m.average == average)
                .unwrap();
            assert_close(found.precision, precision);
            assert_close(found.recall, recall);
            assert_close(found.fscore, fscore);
            assert_eq!(found.support, support);
        }
    }

    #[rstest]
    #[case(Some(SchemeType::IOB2))]
    #[case(None)]
    fn test_classification_report(#[case] scheme: Option<SchemeType>) {
        let (y_true, y_pred) = seqeval_example();
        let reporter = classification_report(
            &y_true,
            &y_pred,
            DivByZeroStrat::ReplaceBy0,
            scheme,
            false,
            '-',
            true,
        )
        .unwrap();
        // NOTE: Do not change the indentation
        let expected = "Class, Precision, Recall, Fscore, Support
Overall_Weighted, 0.5, 0.5, 0.5, 2
Overall_Micro, 0.5, 0.5, 0.5, 2
Overall_Macro, 0.5, 0.5, 0.5, 2
MISC, 0, 0, 0, 1
PER, 1, 1, 1, 1\n";
        assert_eq!(reporter.to_string(), expected);
    }

    #[test]
    fn test_classification_report_inconsistent_length() {
        let test_cases: Vec<(Vec<Vec<&str>>, Vec<Vec<&str>>, ComputationError)> = vec![
            (
                vec![vec!["B-PER"], vec!["I-PER"]],
                vec![vec![]],
                ComputationError::InconsistentLength(2, 1),
            ),
            (
                vec![vec![]],
                vec![],
                ComputationError::InconsistentLength(1, 0),
            ),
            (
                vec![vec!["B-PER", "O"]],
                vec![vec!["B-PER"]],
                ComputationError::InconsistentLength(2, 1),
            ),
        ];
        for (y_true, y_pred, expected) in test_cases {
            let actual = classification_report(
                &y_true,
                &y_pred,
                DivByZeroStrat::ReplaceBy1,
                Some(SchemeType::IOB2),
                false,
                '-',
                true,
            );
            assert_eq!(actual, Err(expected))
        }
    }

    #[test]
    fn test_classification_report_empty() {
        let empty: Vec<Vec<&str>> = vec![];
        let actual = classification_report(
            &empty,
            &empty,
            DivByZeroStrat::ReplaceBy0,
            None,
            false,
            '-',
            false,
        );
        assert_eq!(
            actual,
            Err(ComputationError::EmptyInput(String::from("y_true")))
        );
    }

    #[test]
    fn test_no_entities_follow_zero_division() {
        let y = vec![vec!["O", "O"]];
        let reporter =
            classification_report(&y, &y, DivByZeroStrat::ReplaceBy1, None, false, '-', false)
                .unwrap();
        let micro = reporter.overall(OverallAverage::Micro).unwrap();
        assert_eq!((micro.precision, micro.support), (1.0, 0));
        let actual =
            classification_report(&y, &y, DivByZeroStrat::ReturnError, None, false, '-', false);
        assert_eq!(actual, Err(ComputationError::DivisionByZero));
    }

    #[test]
    fn test_extract_tp_actual_correct() {
        let (y_true, y_pred) = seqeval_example();
        let entities_true = get_entities_strict(&y_true, SchemeType::IOB2, false, '-').unwrap();
        let entities_pred = get_entities_strict(&y_pred, SchemeType::IOB2, false, '-').unwrap();
        let (names, (pred_sum, tp_sum, true_sum)) =
            extract_tp_actual_correct(&entities_true, &entities_pred);
        assert_eq!(names, vec!["MISC", "PER"]);
        assert_eq!(
            (pred_sum.to_vec(), tp_sum.to_vec(), true_sum.to_vec()),
            (vec![1, 1], vec![0, 1], vec![1, 1])
        );
    }

    #[rstest]
    #[case(DivByZeroStrat::ReplaceBy0, Ok(vec![0.5, 0.0, 1.0]))]
    #[case(DivByZeroStrat::ReplaceBy1, Ok(vec![0.5, 1.0, 1.0]))]
    #[case(DivByZeroStrat::ReturnError, Err(ComputationError::DivisionByZero))]
    fn test_prf_divide(
        #[case] strategy: DivByZeroStrat,
        #[case] expected: Result<Vec<f32>, ComputationError>,
        #[values(false, true)] parallel: bool,
    ) {
        let numerator = array![1.0_f32, 0.0, 3.0];
        let denominator = array![2.0_f32, 0.0, 3.0];
        let actual = prf_divide(numerator.view(), denominator.view(), parallel, strategy)
            .map(|a| a.to_vec());
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_prf_divide_error_only_on_zero() {
        let numerator = array![1.0_f32, 2.0];
        let denominator = array![2.0_f32, 4.0];
        let actual = prf_divide(
            numerator.view(),
            denominator.view(),
            false,
            DivByZeroStrat::ReturnError,
        )
        .unwrap();
        assert_eq!(actual, array![0.5, 0.5]);
    }

    #[rstest]
    #[case(Average::Macro, (0.5, 0.5, 0.5, 2))]
    #[case(Average::Micro, (0.5, 0.5, 0.5, 2))]
    #[case(Average::Weighted, (0.5, 0.5, 0.5, 2))]
    fn test_precision_recall_fscore_support(
        #[case] average: Average,
        #[case] expected: (f32, f32, f32, usize),
    ) {
        let (p, r, f, s) = precision_recall_fscore_support(
            array![1, 1].view(),
            array![0, 1].view(),
            array![1, 1].view(),
            1.0_f32,
            average,
            DivByZeroStrat::ReplaceBy0,
            false,
        )
        .unwrap();
        assert_eq!((item(&p).unwrap(), item(&r).unwrap(), item(&f).unwrap(), item(&s).unwrap()), expected);
    }

    #[test]
    fn test_fbeta_uses_beta() {
        // precision 1, recall 0.5
        let (_, _, f, _) = precision_recall_fscore_support(
            array![1].view(),
            array![1].view(),
            array![2].view(),
            2.0_f64,
            Average::None,
            DivByZeroStrat::ReplaceBy0,
            false,
        )
        .unwrap();
        let expected = 5.0 * 0.5 / (4.0 + 0.5);
        assert!((f[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_negative_beta() {
        let actual = precision_recall_fscore_support(
            array![1].view(),
            array![1].view(),
            array![1].view(),
            -1.0_f32,
            Average::None,
            DivByZeroStrat::ReplaceBy0,
            false,
        );
        assert_eq!(actual, Err(ComputationError::BetaNotPositive));
    }

    #[test]
    fn test_accuracy_score() {
        let (y_true, y_pred) = seqeval_example();
        assert_close(accuracy_score(&y_true, &y_pred).unwrap(), 0.8);
        let empty: Vec<Vec<&str>> = vec![vec![]];
        assert!(accuracy_score(&empty, &empty).is_err());
    }

    #[test]
    fn test_seqeval_evaluator() {
        let (y_true, y_pred) = seqeval_example();
        let report = SeqEval::default().evaluate(&y_pred, &y_true).unwrap();
        assert_close(report.precision, 0.5);
        assert_close(report.recall, 0.5);
        assert_close(report.f1, 0.5);
        assert_close(report.accuracy, 0.8);
        assert_eq!(report.reporter.class("PER").unwrap().fscore, 1.0);
    }

    #[rstest]
    #[case(OverallAverage::Macro, 0.26666667)]
    #[case(OverallAverage::Micro, 0.33333334)]
    #[case(OverallAverage::Weighted, 0.26666667)]
    fn test_flat_classification(#[case] average: OverallAverage, #[case] expected_f1: f32) {
        let references = [0, 1, 2, 0, 1, 2];
        let predictions = [0, 2, 1, 0, 0, 1];
        let scores = MacroClassification::new(average, DivByZeroStrat::ReplaceBy0)
            .evaluate(&predictions, &references)
            .unwrap();
        assert_close(scores.f1, expected_f1);
        assert_close(scores.accuracy, 0.33333334);
        assert_eq!(scores.support, 6);
    }

    #[test]
    fn test_flat_classification_uses_union_of_classes() {
        // Class 3 is only predicted: it counts in the macro average with a zero score.
        let scores = MacroClassification::default()
            .evaluate(&[1, 3], &[1, 1])
            .unwrap();
        assert_close(scores.f1, (2.0 / 3.0) / 2.0);
        assert_close(scores.accuracy, 0.5);
    }

    #[test]
    fn test_flat_classification_errors() {
        let evaluator = MacroClassification::default();
        assert_eq!(
            evaluator.evaluate(&[1], &[1, 2]),
            Err(ComputationError::InconsistentLength(2, 1))
        );
        assert_eq!(
            evaluator.evaluate(&[], &[]),
            Err(ComputationError::EmptyInput(String::from("y_true")))
        );
    }

    #[rstest]
    #[case("replaceby0", Ok(DivByZeroStrat::ReplaceBy0))]
    #[case("ReplaceBy1", Ok(DivByZeroStrat::ReplaceBy1))]
    #[case("error", Ok(DivByZeroStrat::ReturnError))]
    #[case("nan", Err(ParsingDivisionByZeroStrategyError(String::from("nan"))))]
    fn test_div_by_zero_from_str(
        #[case] raw: &str,
        #[case] expected: Result<DivByZeroStrat, ParsingDivisionByZeroStrategyError>,
    ) {
        assert_eq!(raw.parse::<DivByZeroStrat>(), expected);
    }
}
