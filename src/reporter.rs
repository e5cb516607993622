/*!
This modules gives a few tools to prettyprint the output for all the classes and the overall
metrics.
*/
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fmt::Display;
use std::hash::Hash;
use std::str::FromStr;
use thiserror::Error;

/// The reporter holds the metrics of each class and the overall metrics. It can be used to
/// display the results (i.e. prettyprint them) as if they were collected into a dataframe and can
/// be consumed to obtain a `HashSet` containing the metrics. The reporter is built by the
/// `classification_report` function.
///
/// # Example
///
/// ```rust
/// use tokclass::{classification_report, DivByZeroStrat, SchemeType};
///
/// let y_true = vec![vec!["B-TEST", "B-NOTEST", "O", "B-TEST"]];
/// let y_pred = vec![vec!["O", "B-NOTEST", "B-OTHER", "B-TEST"]];
///
/// let reporter = classification_report(
///     &y_true,
///     &y_pred,
///     DivByZeroStrat::ReplaceBy0,
///     Some(SchemeType::IOB2),
///     false,
///     '-',
///     false,
/// )
/// .unwrap();
///
/// let expected_report = "Class, Precision, Recall, Fscore, Support
/// Overall_Weighted, 1, 0.6666667, 0.77777785, 3
/// Overall_Micro, 0.6666667, 0.6666667, 0.6666667, 3
/// Overall_Macro, 0.6666667, 0.5, 0.5555556, 3
/// NOTEST, 1, 1, 1, 1
/// OTHER, 0, 0, 0, 0
/// TEST, 1, 0.5, 0.6666667, 2\n";
///
/// assert_eq!(expected_report, reporter.to_string());
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Reporter {
    pub(crate) classes: BTreeSet<ClassMetricsInner>,
}

/// By converting the reporter into a `HashSet` of `ClassMetrics`, you lose the ordering
/// implemented for the reporter. If you mean to consume the data without prettypriting it, this
/// is not a problem.
impl From<Reporter> for HashSet<ClassMetrics> {
    fn from(value: Reporter) -> Self {
        value.classes.into_iter().map(ClassMetrics::from).collect()
    }
}

impl Reporter {
    pub(crate) fn insert(&mut self, metrics: ClassMetricsInner) -> bool {
        self.classes.insert(metrics)
    }

    /// Metrics of a single class, such as `"PER"`.
    pub fn class(&self, class: &str) -> Option<ClassMetrics> {
        self.classes
            .iter()
            .find(|m| m.average == Average::None && m.class == class)
            .cloned()
            .map(ClassMetrics::from)
    }

    /// One of the overall averages.
    pub fn overall(&self, average: OverallAverage) -> Option<ClassMetrics> {
        let average = Average::from(average);
        self.classes
            .iter()
            .find(|m| m.average == average)
            .cloned()
            .map(ClassMetrics::from)
    }

    /// Per-class metrics, sorted by class name.
    pub fn classes(&self) -> impl Iterator<Item = ClassMetrics> + '_ {
        self.classes
            .iter()
            .filter(|m| m.average == Average::None)
            .cloned()
            .map(ClassMetrics::from)
    }
}

/// The Reporter struct acts as a dataframe when displayed.
impl Display for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Class, Precision, Recall, Fscore, Support")?;
        // Overall rows sort last: `.rev()` prints them first, weighted before micro and macro.
        let overall = self.classes.iter().rev().filter(|m| m.average.is_overall());
        let classes = self.classes.iter().filter(|m| !m.average.is_overall());
        for v in overall.chain(classes) {
            writeln!(f, "{}", v)?
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Datastructure holding metrics about a given class.
pub struct ClassMetrics {
    /// The class, such as "PER", "GEO", "MISC", etc.
    pub class: String,
    /// The average used to compute this class' metrics
    pub average: Average,
    /// Precision metric
    pub precision: f32,
    /// Recall metric
    pub recall: f32,
    /// Fscore metric
    pub fscore: f32,
    /// Support metric
    pub support: usize,
}

impl Hash for ClassMetrics {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.class.hash(state);
        self.average.hash(state)
    }
}

impl PartialEq for ClassMetrics {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.average == other.average
    }
}
impl Eq for ClassMetrics {}

impl From<ClassMetricsInner> for ClassMetrics {
    fn from(value: ClassMetricsInner) -> Self {
        Self {
            class: value.class,
            average: value.average,
            precision: value.precision,
            recall: value.recall,
            fscore: value.fscore,
            support: value.support,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
/// Line of the reporter. Equality and ordering only look at the average and the class, so the
/// overall averages are printed before the classes.
pub(crate) struct ClassMetricsInner {
    pub(crate) class: String,
    pub(crate) average: Average,
    pub(crate) precision: f32,
    pub(crate) recall: f32,
    pub(crate) fscore: f32,
    pub(crate) support: usize,
}

impl PartialEq for ClassMetricsInner {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.average == other.average
    }
}
impl Eq for ClassMetricsInner {}

impl PartialOrd for ClassMetricsInner {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassMetricsInner {
    fn cmp(&self, other: &Self) -> Ordering {
        self.average
            .is_overall()
            .cmp(&other.average.is_overall())
            .then_with(|| self.class.cmp(&other.class))
    }
}

impl ClassMetricsInner {
    pub(crate) fn new_class(
        class: &str,
        precision: f32,
        recall: f32,
        fscore: f32,
        support: usize,
    ) -> Self {
        ClassMetricsInner {
            class: String::from(class),
            average: Average::None,
            precision,
            recall,
            fscore,
            support,
        }
    }

    pub(crate) fn new_overall(
        average: OverallAverage,
        precision: f32,
        recall: f32,
        fscore: f32,
        support: usize,
    ) -> Self {
        ClassMetricsInner {
            class: average.to_string(),
            average: average.into(),
            precision,
            recall,
            fscore,
            support,
        }
    }
}

/// The Classmetrics struct acts as a line in a dataframe when displayed.
impl Display for ClassMetricsInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}",
            self.class, self.precision, self.recall, self.fscore, self.support
        )
    }
}

/// Enumeration of the different types of averaging possible and supported by this crate. &str can
/// be parsed to create an `Average`.
#[derive(Debug, Hash, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Average {
    /// One score per class.
    None,
    /// Counts are summed over the classes before dividing.
    Micro,
    /// Unweighted mean of the per-class scores.
    Macro,
    /// Mean of the per-class scores, weighted by their support.
    Weighted,
}

impl Average {
    fn is_overall(&self) -> bool {
        !matches!(self, Average::None)
    }
}

impl Display for Average {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for Average {
    type Err = AverageParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Average::None),
            "micro" => Ok(Average::Micro),
            "macro" => Ok(Average::Macro),
            "weighted" => Ok(Average::Weighted),
            _ => Err(AverageParsingError(String::from(s))),
        }
    }
}

#[derive(Debug, PartialEq, PartialOrd, Eq, Ord, Clone, Error)]
#[error("Impossible to parse the string ({0}) into an Average")]
pub struct AverageParsingError(String);

/// The averages reported next to the per-class metrics.
#[derive(Debug, Hash, PartialEq, Eq, Copy, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverallAverage {
    Micro,
    #[default]
    Macro,
    Weighted,
}

impl OverallAverage {
    pub(crate) const ALL: [OverallAverage; 3] = [
        OverallAverage::Micro,
        OverallAverage::Macro,
        OverallAverage::Weighted,
    ];
}

impl Display for OverallAverage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str_content = match self {
            Self::Micro => "Overall_Micro",
            Self::Macro => "Overall_Macro",
            Self::Weighted => "Overall_Weighted",
        };
        write!(f, "{}", str_content)
    }
}

impl FromStr for OverallAverage {
    type Err = AverageParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<Average>()? {
            Average::Micro => Ok(Self::Micro),
            Average::Macro => Ok(Self::Macro),
            Average::Weighted => Ok(Self::Weighted),
            Average::None => Err(AverageParsingError(String::from(s))),
        }
    }
}

impl From<OverallAverage> for Average {
    fn from(value: OverallAverage) -> Self {
        match value {
            OverallAverage::Micro => Average::Micro,
            OverallAverage::Macro => Average::Macro,
            OverallAverage::Weighted => Average::Weighted,
        }
    }
}
