/*!
Alignment of word-level labels to subword tokens.

A subword tokenizer splits the words of a sentence into smaller units and reports, for each
subword, the index of the word it comes from (or nothing for special tokens such as `[CLS]`).
The functions of this module turn one label per word into one label per subword:

```text
words:       EU       rejects           German
labels:      B-ORG    O                 B-MISC
subwords:    [CLS] EU  re  ##jects  Ger  ##man  [SEP]
word ids:    None  0   1   1        2    2      None
aligned:     -100  B-ORG O O        B-MISC I-MISC -100
```
*/
use crate::error::AlignmentError;
use crate::iob::IobMapping;
use crate::vocabulary::LabelVocabulary;
use rayon::prelude::*;
use std::hash::Hash;

/// Label given to subwords that do not belong to any word. Loss functions and metrics skip it.
pub const DEFAULT_IGNORE_INDEX: i64 = -100;

/// Aligns `word_labels` to the subwords described by `word_ids`.
///
/// * `word_labels`: One label per word.
/// * `word_ids`: For each subword, the index of its word or `None` for special tokens.
/// * `iob_mapping`: When given, the continuation subwords of a word labelled with a begin label
///    receive the paired inside label instead.
/// * `ignore`: Label emitted for special tokens.
///
/// The output always has the length of `word_ids`.
///
/// ```rust
/// use tokclass::{align_labels, DEFAULT_IGNORE_INDEX};
///
/// let labels = vec![1, 0, 1, 1];
/// let word_ids = vec![None, Some(0), Some(1), Some(1), Some(2), Some(3), None];
/// let aligned = align_labels(&labels, &word_ids, None, DEFAULT_IGNORE_INDEX).unwrap();
/// assert_eq!(aligned, vec![-100, 1, 0, 0, 1, 1, -100]);
/// ```
pub fn align_labels<L>(
    word_labels: &[L],
    word_ids: &[Option<usize>],
    iob_mapping: Option<&IobMapping<L>>,
    ignore: L,
) -> Result<Vec<L>, AlignmentError>
where
    L: Clone + Eq + Hash,
{
    let mut aligned = Vec::with_capacity(word_ids.len());
    // `None` both before the first subword and after a special token: in both cases the next
    // subword starts a new word.
    let mut previous: Option<usize> = None;
    for (position, word_id) in word_ids.iter().enumerate() {
        let label = match *word_id {
            None => ignore.clone(),
            Some(word_index) => {
                let label =
                    word_labels
                        .get(word_index)
                        .ok_or(AlignmentError::WordIndexOutOfRange {
                            position,
                            word_index,
                            num_words: word_labels.len(),
                        })?;
                let is_continuation = previous == Some(word_index);
                match iob_mapping {
                    Some(mapping) if is_continuation => {
                        mapping.get(label).unwrap_or(label).clone()
                    }
                    _ => label.clone(),
                }
            }
        };
        aligned.push(label);
        previous = *word_id;
    }
    Ok(aligned)
}

/// Aligns integer labels to subwords. The IOB remapping is enabled when the aligner is built with
/// `use_iob`, in which case the label vocabulary is required to pair begin and inside labels.
///
/// ```rust
/// use tokclass::{LabelAligner, LabelVocabulary};
///
/// let vocabulary =
///     LabelVocabulary::new(["O", "B-PER", "I-PER", "B-MISC", "I-MISC"]).unwrap();
/// let aligner = LabelAligner::new(Some(&vocabulary), true).unwrap();
/// let aligned = aligner
///     .align(&[3, 0], &[None, Some(0), Some(0), Some(1), None])
///     .unwrap();
/// assert_eq!(aligned, vec![-100, 3, 4, 0, -100]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelAligner {
    iob_mapping: Option<IobMapping<i64>>,
    ignore_index: i64,
    parallel: bool,
}

impl Default for LabelAligner {
    fn default() -> Self {
        Self {
            iob_mapping: None,
            ignore_index: DEFAULT_IGNORE_INDEX,
            parallel: false,
        }
    }
}

impl LabelAligner {
    /// Builds an aligner. Fails when `use_iob` is set and no vocabulary is given.
    pub fn new(
        vocabulary: Option<&LabelVocabulary>,
        use_iob: bool,
    ) -> Result<Self, AlignmentError> {
        let iob_mapping = match (use_iob, vocabulary) {
            (false, _) => None,
            (true, None) => return Err(AlignmentError::MissingLabelNames),
            (true, Some(vocabulary)) => Some(IobMapping::from_vocabulary(vocabulary)),
        };
        log::debug!(
            "Built a label aligner (iob: {}, pairs: {})",
            use_iob,
            iob_mapping.as_ref().map(IobMapping::len).unwrap_or(0)
        );
        Ok(Self {
            iob_mapping,
            ..Self::default()
        })
    }

    /// Uses another ignore sentinel than `DEFAULT_IGNORE_INDEX`.
    pub fn with_ignore_index(mut self, ignore_index: i64) -> Self {
        self.ignore_index = ignore_index;
        self
    }

    /// Aligns the examples of a batch on multiple threads.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn ignore_index(&self) -> i64 {
        self.ignore_index
    }

    pub fn iob_mapping(&self) -> Option<&IobMapping<i64>> {
        self.iob_mapping.as_ref()
    }

    pub fn uses_iob(&self) -> bool {
        self.iob_mapping.is_some()
    }

    /// Aligns the labels of a single example.
    pub fn align(
        &self,
        word_labels: &[i64],
        word_ids: &[Option<usize>],
    ) -> Result<Vec<i64>, AlignmentError> {
        let aligned = align_labels(
            word_labels,
            word_ids,
            self.iob_mapping.as_ref(),
            self.ignore_index,
        )?;
        log::trace!(
            "Aligned {} word labels to {} subwords",
            word_labels.len(),
            aligned.len()
        );
        Ok(aligned)
    }

    /// Aligns every example of a batch. `word_labels` and `word_ids` are zipped; the shortest
    /// one decides the number of aligned examples.
    pub fn align_batch<L, W>(
        &self,
        word_labels: &[L],
        word_ids: &[W],
    ) -> Result<Vec<Vec<i64>>, AlignmentError>
    where
        L: AsRef<[i64]> + Sync,
        W: AsRef<[Option<usize>]> + Sync,
    {
        if self.parallel {
            word_labels
                .par_iter()
                .zip(word_ids.par_iter())
                .map(|(labels, ids)| self.align(labels.as_ref(), ids.as_ref()))
                .collect()
        } else {
            word_labels
                .iter()
                .zip(word_ids.iter())
                .map(|(labels, ids)| self.align(labels.as_ref(), ids.as_ref()))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::tests::conll_vocabulary;
    use quickcheck::{Arbitrary, Gen, QuickCheck, TestResult};
    use rstest::rstest;

    fn iob_aligner() -> LabelAligner {
        LabelAligner::new(Some(&conll_vocabulary()), true).unwrap()
    }

    #[test]
    fn test_simple_alignment() {
        let labels = vec![1, 0, 1, 1];
        let word_ids = vec![None, Some(0), Some(1), Some(1), Some(2), Some(3), None];
        let actual = LabelAligner::default().align(&labels, &word_ids).unwrap();
        assert_eq!(actual, vec![-100, 1, 0, 0, 1, 1, -100]);
    }

    #[test]
    fn test_iob_alignment() {
        let labels = vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 7, 0, 0, 0, 0, 0, 0, 0];
        #[rustfmt::skip]
        let word_ids = vec![
            None, Some(0), Some(1), Some(1), Some(1), Some(2), Some(3), Some(4), Some(5), Some(5),
            Some(5), Some(5), Some(5), Some(5), Some(6), Some(7), Some(7), Some(7), Some(8),
            Some(9), Some(9), Some(10), Some(10), Some(11), Some(12), Some(13), Some(14),
            Some(15), Some(16), Some(17), None,
        ];
        #[rustfmt::skip]
        let expected = vec![
            -100, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 7, 8, 0, 0, 0, 0,
            0, 0, 0, -100,
        ];
        let actual = iob_aligner().align(&labels, &word_ids).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_iob_disabled_keeps_begin_labels() {
        let aligner = LabelAligner::new(Some(&conll_vocabulary()), false).unwrap();
        let actual = aligner
            .align(&[1, 2], &[None, Some(0), Some(0), Some(1), Some(1), None])
            .unwrap();
        assert_eq!(actual, vec![-100, 1, 1, 2, 2, -100]);
    }

    #[test]
    fn test_special_token_between_subwords_restarts_word() {
        // A word whose subwords are separated by a special token keeps its begin label on both
        // sides of the special token.
        let actual = iob_aligner()
            .align(&[1], &[Some(0), None, Some(0), Some(0)])
            .unwrap();
        assert_eq!(actual, vec![1, -100, 1, 2]);
    }

    #[test]
    fn test_inside_label_is_never_remapped() {
        let actual = iob_aligner()
            .align(&[1, 2], &[Some(0), Some(0), Some(1), Some(1), Some(1)])
            .unwrap();
        assert_eq!(actual, vec![1, 2, 2, 2, 2]);
    }

    #[test]
    fn test_missing_label_names() {
        assert_eq!(
            LabelAligner::new(None, true),
            Err(AlignmentError::MissingLabelNames)
        );
        assert!(LabelAligner::new(None, false).is_ok());
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_word_index_out_of_range(#[case] use_iob: bool) {
        let aligner = LabelAligner::new(Some(&conll_vocabulary()), use_iob).unwrap();
        let actual = aligner.align(&[0, 1], &[None, Some(0), Some(2), None]);
        assert_eq!(
            actual,
            Err(AlignmentError::WordIndexOutOfRange {
                position: 2,
                word_index: 2,
                num_words: 2
            })
        );
    }

    #[test]
    fn test_custom_ignore_index() {
        let aligner = LabelAligner::default().with_ignore_index(-1);
        let actual = aligner.align(&[4], &[None, Some(0), None]).unwrap();
        assert_eq!(actual, vec![-1, 4, -1]);
    }

    #[test]
    fn test_string_labels() {
        let names = conll_vocabulary();
        let mapping = IobMapping::from_names(names.names());
        let labels: Vec<String> = ["B-LOC", "O"].into_iter().map(String::from).collect();
        let actual = align_labels(
            &labels,
            &[None, Some(0), Some(0), Some(1)],
            Some(&mapping),
            String::from("[IGNORE]"),
        )
        .unwrap();
        assert_eq!(actual, vec!["[IGNORE]", "B-LOC", "I-LOC", "O"]);
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_align_batch(#[case] parallel: bool) {
        let aligner = iob_aligner().with_parallel(parallel);
        let labels = vec![vec![7, 0], vec![1]];
        let word_ids = vec![
            vec![None, Some(0), Some(0), Some(1), None],
            vec![None, Some(0), Some(0), Some(0), None],
        ];
        let actual = aligner.align_batch(&labels, &word_ids).unwrap();
        assert_eq!(
            actual,
            vec![vec![-100, 7, 8, 0, -100], vec![-100, 1, 2, 2, -100]]
        );
        let broken = vec![vec![None, Some(3)], vec![None]];
        assert!(aligner.align_batch(&labels, &broken).is_err());
    }

    /// A word-level example together with a word-index map that only references its words.
    #[derive(Debug, Clone)]
    struct Example {
        labels: Vec<i64>,
        word_ids: Vec<Option<usize>>,
    }

    impl Arbitrary for Example {
        fn arbitrary(g: &mut Gen) -> Self {
            let num_labels = 9;
            let labels: Vec<i64> = Vec::<u8>::arbitrary(g)
                .into_iter()
                .map(|l| (l % num_labels) as i64)
                .collect();
            let mut word_ids = vec![None];
            for (word, _) in labels.iter().enumerate() {
                let pieces = 1 + usize::arbitrary(g) % 3;
                word_ids.extend(std::iter::repeat(Some(word)).take(pieces));
                if bool::arbitrary(g) && bool::arbitrary(g) {
                    word_ids.push(None)
                }
            }
            word_ids.push(None);
            Example { labels, word_ids }
        }
    }

    #[test]
    fn test_propertie_alignment_contract() {
        fn alignment_contract(example: Example, use_iob: bool) -> TestResult {
            let vocabulary = conll_vocabulary();
            let mapping = IobMapping::from_vocabulary(&vocabulary);
            let aligner = LabelAligner::new(Some(&vocabulary), use_iob).unwrap();
            let aligned = aligner.align(&example.labels, &example.word_ids).unwrap();
            if aligned.len() != example.word_ids.len() {
                return TestResult::failed();
            }
            let mut previous: Option<usize> = None;
            for (label, word_id) in aligned.iter().zip(example.word_ids.iter()) {
                let ok = match word_id {
                    None => *label == DEFAULT_IGNORE_INDEX,
                    Some(w) => {
                        let word_label = example.labels[*w];
                        let continuation = previous == Some(*w);
                        match mapping.get(&word_label) {
                            Some(inside) if use_iob && continuation => label == inside,
                            _ => *label == word_label,
                        }
                    }
                };
                if !ok {
                    return TestResult::failed();
                }
                previous = *word_id;
            }
            TestResult::passed()
        }
        let mut qc = QuickCheck::new().tests(1000);
        qc.quickcheck(alignment_contract as fn(Example, bool) -> TestResult)
    }
}
