/*!
This modules contains the configuration structs of the crate. `TokenClassificationConfig` drives the
label alignment and the tokenize-and-align pipeline, `MetricConfig` drives the metric computors and
the `classification_report_conf` function. Both implement `Default`, can be deserialized with serde
and come with a builder.
*/
use crate::aligner::{LabelAligner, DEFAULT_IGNORE_INDEX};
use crate::entity::SchemeType;
use crate::error::AlignmentError;
use crate::metrics::DivByZeroStrat;
use crate::reporter::OverallAverage;
use crate::vocabulary::LabelVocabulary;
use either::Either as LeftOrRight;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

const DEFAULT_INPUT_COLUMN: &str = "tokens";
const DEFAULT_LABEL_COLUMN: &str = "labels";

/// Configuration of the alignment side of a token classification task.
///
/// ```rust
/// use tokclass::{LabelAligner, LabelVocabulary, TokenClassificationConfig};
///
/// let config = TokenClassificationConfig::builder()
///     .label_names(LabelVocabulary::new(["O", "B-PER", "I-PER"]).unwrap())
///     .use_iob(true)
///     .label_column("ner_tags")
///     .build();
/// let aligner = LabelAligner::try_from(&config).unwrap();
/// assert!(aligner.uses_iob());
/// assert_eq!(config.label_column(), "ner_tags");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenClassificationConfig {
    label_names: Option<LabelVocabulary>,
    use_iob: bool,
    ignore_index: i64,
    input_column: String,
    label_column: String,
    parallel: bool,
}

impl Default for TokenClassificationConfig {
    fn default() -> Self {
        Self {
            label_names: None,
            use_iob: false,
            ignore_index: DEFAULT_IGNORE_INDEX,
            input_column: String::from(DEFAULT_INPUT_COLUMN),
            label_column: String::from(DEFAULT_LABEL_COLUMN),
            parallel: false,
        }
    }
}

impl TokenClassificationConfig {
    pub fn builder() -> TokenClassificationConfigBuilder {
        TokenClassificationConfigBuilder::default()
    }

    pub fn label_names(&self) -> Option<&LabelVocabulary> {
        self.label_names.as_ref()
    }

    pub fn use_iob(&self) -> bool {
        self.use_iob
    }

    pub fn ignore_index(&self) -> i64 {
        self.ignore_index
    }

    pub fn input_column(&self) -> &str {
        &self.input_column
    }

    pub fn label_column(&self) -> &str {
        &self.label_column
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }
}

impl Display for TokenClassificationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels = match &self.label_names {
            Some(vocabulary) => vocabulary.to_string(),
            None => String::from("None"),
        };
        write!(f, "Label names: {}\n Using IOB remapping: {}\n Ignore index: {}\n Input column: {}\n Label column: {}\n Using parallel computations: {}", labels, self.use_iob, self.ignore_index, self.input_column, self.label_column, self.parallel)
    }
}

impl TryFrom<&TokenClassificationConfig> for LabelAligner {
    type Error = AlignmentError;
    fn try_from(config: &TokenClassificationConfig) -> Result<Self, Self::Error> {
        Ok(LabelAligner::new(config.label_names.as_ref(), config.use_iob)?
            .with_ignore_index(config.ignore_index)
            .with_parallel(config.parallel))
    }
}

/// This builder can be used to build and customize a `TokenClassificationConfig` structure.
#[derive(Debug, Clone, Default)]
pub struct TokenClassificationConfigBuilder {
    inner: TokenClassificationConfig,
}

impl TokenClassificationConfigBuilder {
    pub fn label_names(mut self, label_names: LabelVocabulary) -> Self {
        self.inner.label_names = Some(label_names);
        self
    }
    pub fn use_iob(mut self, use_iob: bool) -> Self {
        self.inner.use_iob = use_iob;
        self
    }
    pub fn ignore_index(mut self, ignore_index: i64) -> Self {
        self.inner.ignore_index = ignore_index;
        self
    }
    pub fn input_column(mut self, input_column: impl Into<String>) -> Self {
        self.inner.input_column = input_column.into();
        self
    }
    pub fn label_column(mut self, label_column: impl Into<String>) -> Self {
        self.inner.label_column = label_column.into();
        self
    }
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.inner.parallel = parallel;
        self
    }
    pub fn build(self) -> TokenClassificationConfig {
        self.inner
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
/// Config struct used to simplify the inputs of the metric computors and of the
/// `classification_report_conf` function. It implements the default trait.
pub struct MetricConfig {
    pub(crate) zero_division: DivByZeroStrat,
    pub(crate) average: OverallAverage,
    pub(crate) scheme: Option<SchemeType>,
    pub(crate) suffix: bool,
    pub(crate) delimiter: char,
    pub(crate) ignore_index: i64,
    pub(crate) parallel: bool,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            zero_division: DivByZeroStrat::ReplaceBy0,
            average: OverallAverage::Macro,
            scheme: None,
            suffix: false,
            delimiter: '-',
            ignore_index: DEFAULT_IGNORE_INDEX,
            parallel: false,
        }
    }
}

impl MetricConfig {
    pub fn builder() -> MetricConfigBuilder {
        MetricConfigBuilder::new()
    }

    pub fn zero_division(&self) -> DivByZeroStrat {
        self.zero_division
    }

    pub fn average(&self) -> OverallAverage {
        self.average
    }

    pub fn scheme(&self) -> Option<SchemeType> {
        self.scheme
    }

    pub fn suffix(&self) -> bool {
        self.suffix
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn ignore_index(&self) -> i64 {
        self.ignore_index
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }
}

impl Display for MetricConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let string = format!("Strategy when encountering a division by zero: {:?}\n Flat average: {:?}\n Optional scheme used: {:?}\n Prefix located at the end of the tokens: {}\n Delimiter: {}\n Ignore index: {}\n Using parallel computations: {}", self.zero_division, self.average, self.scheme, self.suffix, self.delimiter, self.ignore_index, self.parallel);
        write!(f, "{}", string)
    }
}

/// This builder can be used to build and customize a `MetricConfig` structure. The division by
/// zero strategy can be given as anything convertible into a `DivByZeroStrat`.
///
/// ```rust
/// use tokclass::{DivByZeroStrat, MetricConfig, SchemeType};
///
/// let config = MetricConfig::builder()
///     .division_by_zero(DivByZeroStrat::ReplaceBy1)
///     .scheme(SchemeType::IOBES)
///     .build();
/// assert_eq!(config.zero_division(), DivByZeroStrat::ReplaceBy1);
/// assert_eq!(config.scheme(), Some(SchemeType::IOBES));
/// assert_eq!(config.ignore_index(), -100);
/// ```
#[derive(Debug, Clone)]
pub struct MetricConfigBuilder<ZeroDiv = DivByZeroStrat>
where
    ZeroDiv: Into<DivByZeroStrat>,
{
    zero_division: LeftOrRight<ZeroDiv, DivByZeroStrat>,
    average: OverallAverage,
    scheme: Option<SchemeType>,
    suffix: bool,
    delimiter: char,
    ignore_index: i64,
    parallel: bool,
}

impl MetricConfigBuilder<DivByZeroStrat> {
    pub fn new() -> Self {
        let defaults = MetricConfig::default();
        Self {
            zero_division: LeftOrRight::Right(defaults.zero_division),
            average: defaults.average,
            scheme: defaults.scheme,
            suffix: defaults.suffix,
            delimiter: defaults.delimiter,
            ignore_index: defaults.ignore_index,
            parallel: defaults.parallel,
        }
    }
}

impl Default for MetricConfigBuilder<DivByZeroStrat> {
    fn default() -> Self {
        Self::new()
    }
}

impl<ZeroDiv> MetricConfigBuilder<ZeroDiv>
where
    ZeroDiv: Into<DivByZeroStrat>,
{
    pub fn division_by_zero<Z>(self, division_by_zero: Z) -> MetricConfigBuilder<Z>
    where
        Z: Into<DivByZeroStrat>,
    {
        MetricConfigBuilder {
            zero_division: LeftOrRight::Left(division_by_zero),
            average: self.average,
            scheme: self.scheme,
            suffix: self.suffix,
            delimiter: self.delimiter,
            ignore_index: self.ignore_index,
            parallel: self.parallel,
        }
    }
    pub fn average(mut self, average: OverallAverage) -> Self {
        self.average = average;
        self
    }
    /// Strict mode. Without a scheme, entities are extracted in lenient mode.
    pub fn scheme(mut self, scheme: SchemeType) -> Self {
        self.scheme = Some(scheme);
        self
    }
    pub fn suffix(mut self, suffix: bool) -> Self {
        self.suffix = suffix;
        self
    }
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }
    pub fn ignore_index(mut self, ignore_index: i64) -> Self {
        self.ignore_index = ignore_index;
        self
    }
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
    pub fn build(self) -> MetricConfig {
        MetricConfig {
            zero_division: self.zero_division.either_into(),
            average: self.average,
            scheme: self.scheme,
            suffix: self.suffix,
            delimiter: self.delimiter,
            ignore_index: self.ignore_index,
            parallel: self.parallel,
        }
    }
}
