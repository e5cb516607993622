/*!
This module parses sequences of tags (`B-PER`, `I-PER`, `O`, ...) into entities. Two parsers are
available:

* the lenient parser follows the conlleval rules and accepts any mix of prefixes;
* the strict parser validates every token against a `SchemeType` and only keeps the chunks that
  are well formed under that scheme.
*/
use crate::error::{AutoDetectError, ConversionError, InvalidToken, ParsingError};
use ahash::{AHashMap, AHashSet};
use enum_iterator::{all, Sequence};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// An entity represent a named objet in named entity recognition (NER). It contains the sentence
/// it was found in, a start and an end (i.e. at what index of the sentence does it starts and
/// ends) and a tag, which is the associated class (such as `LOC`, `PER`, etc.).
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Entity<'a> {
    pub sent_id: usize,
    pub start: usize,
    pub end: usize,
    pub tag: &'a str,
}

impl<'a> Entity<'a> {
    pub(crate) fn new(sent_id: usize, start: usize, end: usize, tag: &'a str) -> Self {
        Entity {
            sent_id,
            start,
            end,
            tag,
        }
    }
}

impl Display for Entity<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.sent_id, self.tag, self.start, self.end
        )
    }
}

#[derive(Debug, PartialEq, Hash, Clone, Copy, Eq)]
/// Prefix represent an annotation specifying the place of a token in a chunk. For example, in
/// `IOB1`, the `I` prefix is used to indicate that the token is inside a NER. Prefix can only be a
/// single character.
pub(crate) enum Prefix {
    I,
    O,
    B,
    E,
    S,
    U,
    L,
    /// Marker used in the pattern tables. It is never parsed from a token.
    Any,
}

impl TryFrom<char> for Prefix {
    type Error = ParsingError;
    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value {
            'I' => Ok(Self::I),
            'O' => Ok(Self::O),
            'B' => Ok(Self::B),
            'E' => Ok(Self::E),
            'S' => Ok(Self::S),
            'U' => Ok(Self::U),
            'L' => Ok(Self::L),
            _ => Err(ParsingError::PrefixError(String::from(value))),
        }
    }
}

impl Prefix {
    fn as_char(&self) -> char {
        match self {
            Self::I => 'I',
            Self::O => 'O',
            Self::B => 'B',
            Self::E => 'E',
            Self::S => 'S',
            Self::U => 'U',
            Self::L => 'L',
            Self::Any => '*',
        }
    }

    /// This functions verifies that this prefix and the other prefix are the same or one of them
    /// is the `Any` prefix.
    fn are_the_same_or_contains_any(&self, other: &Prefix) -> bool {
        matches!((self, other), (Prefix::Any, _) | (_, Prefix::Any)) || self == other
    }
}

#[derive(Debug, PartialEq, Hash, Clone, Copy)]
enum Tag {
    Same,
    Diff,
    Any,
}

type Pattern = (Prefix, Prefix, Tag);

#[derive(Debug, PartialEq, Hash, Clone, Copy)]
pub(crate) struct Token<'a> {
    /// The full token, such as `"B-PER"`, `"I-LOC"`, etc.
    token: &'a str,
    /// The prefix, such as `B`, `I`, `O`, etc.
    pub(crate) prefix: Prefix,
    /// The tag, such as `"PER"`, `"LOC"`. Tokens without a tag get `"_"`.
    pub(crate) tag: &'a str,
}

impl<'a> Token<'a> {
    const OUTSIDE: Token<'static> = Token {
        token: "O",
        prefix: Prefix::O,
        tag: "_",
    };

    /// Parses a token.
    ///
    /// * `token`: str to parse the token from.
    /// * `suffix`: If `true`, the prefix is the last character of the token, else the first.
    /// * `delimiter`: Character separating the prefix from the tag. At most one delimiter is
    ///   removed.
    pub(crate) fn try_new(
        token: &'a str,
        suffix: bool,
        delimiter: char,
    ) -> Result<Self, ParsingError> {
        let mut chars = token.chars();
        let (prefix_char, tag) = if suffix {
            let c = chars.next_back().ok_or(ParsingError::EmptyToken)?;
            let rest = chars.as_str();
            (c, rest.strip_suffix(delimiter).unwrap_or(rest))
        } else {
            let c = chars.next().ok_or(ParsingError::EmptyToken)?;
            let rest = chars.as_str();
            (c, rest.strip_prefix(delimiter).unwrap_or(rest))
        };
        let prefix = Prefix::try_from(prefix_char)?;
        let tag = if tag.is_empty() { "_" } else { tag };
        Ok(Self { token, prefix, tag })
    }

    #[inline]
    fn check_tag(&self, prev: &Token, cond: Tag) -> bool {
        match cond {
            Tag::Any => true,
            Tag::Same => prev.tag == self.tag,
            Tag::Diff => prev.tag != self.tag,
        }
    }

    /// Check whether the prefix patterns are matched.
    ///
    /// * `prev`: Previous token
    /// * `patterns`: Patterns to match the token against
    fn check_patterns(&self, prev: &Token, patterns: &[Pattern]) -> bool {
        patterns.iter().any(|(prev_prefix, current_prefix, tag_cond)| {
            prev_prefix.are_the_same_or_contains_any(&prev.prefix)
                && current_prefix.are_the_same_or_contains_any(&self.prefix)
                && self.check_tag(prev, *tag_cond)
        })
    }

    fn is_valid(&self, scheme: SchemeType) -> bool {
        scheme.allowed_prefixes().contains(&self.prefix)
    }

    /// Check whether the current token is the start of chunk.
    fn is_start(&self, prev: &Token, scheme: SchemeType) -> bool {
        self.check_patterns(prev, scheme.start_patterns())
    }

    /// Check whether the current token is inside the chunk started by `prev`.
    fn is_inside(&self, prev: &Token, scheme: SchemeType) -> bool {
        self.check_patterns(prev, scheme.inside_patterns())
    }

    /// Check whether the *previous* token is the end of chunk.
    fn is_end(&self, prev: &Token, scheme: SchemeType) -> bool {
        self.check_patterns(prev, scheme.end_patterns())
    }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(
    Debug, Clone, Copy, Sequence, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize,
)]
/// Enumeration of the supported Schemes. They are use to indicate how we are supposed to parse and
/// chunk the different tokens. The declaration order is the order used by `SchemeType::detect`.
pub enum SchemeType {
    IOB2,
    IOE2,
    IOBES,
    BILOU,
    IOB1,
    IOE1,
}

impl SchemeType {
    const IOB1_ALLOWED_PREFIXES: [Prefix; 3] = [Prefix::I, Prefix::O, Prefix::B];
    const IOB1_START_PATTERNS: [Pattern; 5] = [
        (Prefix::O, Prefix::I, Tag::Any),
        (Prefix::I, Prefix::I, Tag::Diff),
        (Prefix::B, Prefix::I, Tag::Any),
        (Prefix::I, Prefix::B, Tag::Same),
        (Prefix::B, Prefix::B, Tag::Same),
    ];
    const IOB1_INSIDE_PATTERNS: [Pattern; 2] = [
        (Prefix::B, Prefix::I, Tag::Same),
        (Prefix::I, Prefix::I, Tag::Same),
    ];
    const IOB1_END_PATTERNS: [Pattern; 6] = [
        (Prefix::I, Prefix::I, Tag::Diff),
        (Prefix::I, Prefix::O, Tag::Any),
        (Prefix::I, Prefix::B, Tag::Any),
        (Prefix::B, Prefix::O, Tag::Any),
        (Prefix::B, Prefix::I, Tag::Diff),
        (Prefix::B, Prefix::B, Tag::Same),
    ];

    const IOE1_ALLOWED_PREFIXES: [Prefix; 3] = [Prefix::I, Prefix::O, Prefix::E];
    const IOE1_START_PATTERNS: [Pattern; 4] = [
        (Prefix::O, Prefix::I, Tag::Any),
        (Prefix::I, Prefix::I, Tag::Diff),
        (Prefix::E, Prefix::I, Tag::Any),
        (Prefix::E, Prefix::E, Tag::Same),
    ];
    const IOE1_INSIDE_PATTERNS: [Pattern; 2] = [
        (Prefix::I, Prefix::I, Tag::Same),
        (Prefix::I, Prefix::E, Tag::Same),
    ];
    const IOE1_END_PATTERNS: [Pattern; 5] = [
        (Prefix::I, Prefix::I, Tag::Diff),
        (Prefix::I, Prefix::O, Tag::Any),
        (Prefix::I, Prefix::E, Tag::Diff),
        (Prefix::E, Prefix::I, Tag::Same),
        (Prefix::E, Prefix::E, Tag::Same),
    ];

    const IOB2_ALLOWED_PREFIXES: [Prefix; 3] = [Prefix::I, Prefix::O, Prefix::B];
    const IOB2_START_PATTERNS: [Pattern; 1] = [(Prefix::Any, Prefix::B, Tag::Any)];
    const IOB2_INSIDE_PATTERNS: [Pattern; 2] = [
        (Prefix::B, Prefix::I, Tag::Same),
        (Prefix::I, Prefix::I, Tag::Same),
    ];
    const IOB2_END_PATTERNS: [Pattern; 6] = [
        (Prefix::I, Prefix::O, Tag::Any),
        (Prefix::I, Prefix::I, Tag::Diff),
        (Prefix::I, Prefix::B, Tag::Any),
        (Prefix::B, Prefix::O, Tag::Any),
        (Prefix::B, Prefix::I, Tag::Diff),
        (Prefix::B, Prefix::B, Tag::Any),
    ];

    const IOE2_ALLOWED_PREFIXES: [Prefix; 3] = [Prefix::I, Prefix::O, Prefix::E];
    const IOE2_START_PATTERNS: [Pattern; 6] = [
        (Prefix::O, Prefix::I, Tag::Any),
        (Prefix::O, Prefix::E, Tag::Any),
        (Prefix::E, Prefix::I, Tag::Any),
        (Prefix::E, Prefix::E, Tag::Any),
        (Prefix::I, Prefix::I, Tag::Diff),
        (Prefix::I, Prefix::E, Tag::Diff),
    ];
    const IOE2_INSIDE_PATTERNS: [Pattern; 2] = [
        (Prefix::I, Prefix::E, Tag::Same),
        (Prefix::I, Prefix::I, Tag::Same),
    ];
    const IOE2_END_PATTERNS: [Pattern; 1] = [(Prefix::E, Prefix::Any, Tag::Any)];

    const IOBES_ALLOWED_PREFIXES: [Prefix; 5] =
        [Prefix::I, Prefix::O, Prefix::E, Prefix::B, Prefix::S];
    const IOBES_START_PATTERNS: [Pattern; 2] = [
        (Prefix::Any, Prefix::B, Tag::Any),
        (Prefix::Any, Prefix::S, Tag::Any),
    ];
    const IOBES_INSIDE_PATTERNS: [Pattern; 4] = [
        (Prefix::B, Prefix::I, Tag::Same),
        (Prefix::B, Prefix::E, Tag::Same),
        (Prefix::I, Prefix::I, Tag::Same),
        (Prefix::I, Prefix::E, Tag::Same),
    ];
    const IOBES_END_PATTERNS: [Pattern; 2] = [
        (Prefix::S, Prefix::Any, Tag::Any),
        (Prefix::E, Prefix::Any, Tag::Any),
    ];

    const BILOU_ALLOWED_PREFIXES: [Prefix; 5] =
        [Prefix::B, Prefix::I, Prefix::L, Prefix::O, Prefix::U];
    const BILOU_START_PATTERNS: [Pattern; 2] = [
        (Prefix::Any, Prefix::B, Tag::Any),
        (Prefix::Any, Prefix::U, Tag::Any),
    ];
    const BILOU_INSIDE_PATTERNS: [Pattern; 4] = [
        (Prefix::B, Prefix::I, Tag::Same),
        (Prefix::B, Prefix::L, Tag::Same),
        (Prefix::I, Prefix::I, Tag::Same),
        (Prefix::I, Prefix::L, Tag::Same),
    ];
    const BILOU_END_PATTERNS: [Pattern; 2] = [
        (Prefix::U, Prefix::Any, Tag::Any),
        (Prefix::L, Prefix::Any, Tag::Any),
    ];

    pub(crate) fn allowed_prefixes(&self) -> &'static [Prefix] {
        match self {
            Self::IOB1 => &Self::IOB1_ALLOWED_PREFIXES,
            Self::IOE1 => &Self::IOE1_ALLOWED_PREFIXES,
            Self::IOB2 => &Self::IOB2_ALLOWED_PREFIXES,
            Self::IOE2 => &Self::IOE2_ALLOWED_PREFIXES,
            Self::IOBES => &Self::IOBES_ALLOWED_PREFIXES,
            Self::BILOU => &Self::BILOU_ALLOWED_PREFIXES,
        }
    }
    fn start_patterns(&self) -> &'static [Pattern] {
        match self {
            Self::IOB1 => &Self::IOB1_START_PATTERNS,
            Self::IOE1 => &Self::IOE1_START_PATTERNS,
            Self::IOB2 => &Self::IOB2_START_PATTERNS,
            Self::IOE2 => &Self::IOE2_START_PATTERNS,
            Self::IOBES => &Self::IOBES_START_PATTERNS,
            Self::BILOU => &Self::BILOU_START_PATTERNS,
        }
    }
    fn inside_patterns(&self) -> &'static [Pattern] {
        match self {
            Self::IOB1 => &Self::IOB1_INSIDE_PATTERNS,
            Self::IOE1 => &Self::IOE1_INSIDE_PATTERNS,
            Self::IOB2 => &Self::IOB2_INSIDE_PATTERNS,
            Self::IOE2 => &Self::IOE2_INSIDE_PATTERNS,
            Self::IOBES => &Self::IOBES_INSIDE_PATTERNS,
            Self::BILOU => &Self::BILOU_INSIDE_PATTERNS,
        }
    }
    fn end_patterns(&self) -> &'static [Pattern] {
        match self {
            Self::IOB1 => &Self::IOB1_END_PATTERNS,
            Self::IOE1 => &Self::IOE1_END_PATTERNS,
            Self::IOB2 => &Self::IOB2_END_PATTERNS,
            Self::IOE2 => &Self::IOE2_END_PATTERNS,
            Self::IOBES => &Self::IOBES_END_PATTERNS,
            Self::BILOU => &Self::BILOU_END_PATTERNS,
        }
    }

    /// Detects the scheme of the sequences from the prefixes they use. The first scheme (in
    /// declaration order) whose allowed prefixes cover every observed prefix is returned.
    ///
    /// ```rust
    /// use tokclass::SchemeType;
    ///
    /// let sequences = vec![vec!["B-PER", "E-PER", "O", "S-LOC"]];
    /// assert_eq!(SchemeType::detect(&sequences, false, '-'), Ok(SchemeType::IOBES));
    /// ```
    pub fn detect(
        sequences: &[Vec<&str>],
        suffix: bool,
        delimiter: char,
    ) -> Result<SchemeType, AutoDetectError> {
        let mut prefixes: AHashSet<Prefix> = AHashSet::default();
        for token in sequences.iter().flatten() {
            prefixes.insert(Token::try_new(token, suffix, delimiter)?.prefix);
        }
        all::<SchemeType>()
            .find(|scheme| {
                let allowed = scheme.allowed_prefixes();
                prefixes.iter().all(|p| allowed.contains(p))
            })
            .ok_or_else(|| {
                let mut observed: Vec<char> = prefixes.iter().map(Prefix::as_char).collect();
                observed.sort_unstable();
                AutoDetectError::NoSchemeParsed(observed)
            })
    }
}

impl Display for SchemeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for SchemeType {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IOB1" => Ok(Self::IOB1),
            "IOE1" => Ok(Self::IOE1),
            "IOB2" => Ok(Self::IOB2),
            "IOE2" => Ok(Self::IOE2),
            "IOBES" => Ok(Self::IOBES),
            "BILOU" => Ok(Self::BILOU),
            _ => Err(ParsingError::PrefixError(String::from(s))),
        }
    }
}

/// Leniently retrieves the entities from a sequence. Entity ends are inclusive.
pub fn get_entities_lenient<'a>(
    sequences: &[Vec<&'a str>],
    suffix: bool,
    delimiter: char,
) -> Result<Entities<'a>, ParsingError> {
    let entities = sequences
        .iter()
        .enumerate()
        .map(|(sent_id, sequence)| lenient_chunks(sent_id, sequence, suffix, delimiter))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Entities(entities))
}

/// Chunks a single sequence with the conlleval rules. A virtual `O` is appended so that a chunk
/// running until the end of the sequence is closed.
fn lenient_chunks<'a>(
    sent_id: usize,
    sequence: &[&'a str],
    suffix: bool,
    delimiter: char,
) -> Result<Vec<Entity<'a>>, ParsingError> {
    let mut chunks = Vec::new();
    let mut prev = Token::OUTSIDE;
    // The initial previous type matches no tag.
    let mut prev_type = "";
    let mut begin_offset = 0;
    for (i, raw) in sequence.iter().copied().chain(["O"]).enumerate() {
        let current = Token::try_new(raw, suffix, delimiter)?;
        if end_of_chunk(prev.prefix, current.prefix, prev_type, current.tag) {
            chunks.push(Entity::new(sent_id, begin_offset, i - 1, prev_type));
        }
        if start_of_chunk(prev.prefix, current.prefix, prev_type, current.tag) {
            begin_offset = i;
        }
        prev = current;
        prev_type = current.tag;
    }
    Ok(chunks)
}

/// Checks if a chunk ended between the previous and current word.
fn end_of_chunk(prev: Prefix, current: Prefix, prev_type: &str, current_type: &str) -> bool {
    match (prev, current) {
        (Prefix::E, _) | (Prefix::S, _) => true,
        (Prefix::B, Prefix::B) | (Prefix::B, Prefix::S) | (Prefix::B, Prefix::O) => true,
        (Prefix::I, Prefix::B) | (Prefix::I, Prefix::S) | (Prefix::I, Prefix::O) => true,
        (prev, _) => prev != Prefix::O && prev_type != current_type,
    }
}

/// Checks if a chunk started between the previous and current word.
fn start_of_chunk(prev: Prefix, current: Prefix, prev_type: &str, current_type: &str) -> bool {
    match (prev, current) {
        (_, Prefix::B) | (_, Prefix::S) => true,
        (Prefix::E, Prefix::E) | (Prefix::E, Prefix::I) => true,
        (Prefix::S, Prefix::E) | (Prefix::S, Prefix::I) => true,
        (Prefix::O, Prefix::E) | (Prefix::O, Prefix::I) => true,
        (_, current) => current != Prefix::O && prev_type != current_type,
    }
}

/// Strictly retrieves the entities from a sequence: every token must use a prefix of `scheme`
/// and only chunks matching the scheme's start, inside and end patterns are kept. Entity ends
/// are exclusive.
pub fn get_entities_strict<'a>(
    sequences: &[Vec<&'a str>],
    scheme: SchemeType,
    suffix: bool,
    delimiter: char,
) -> Result<Entities<'a>, ConversionError> {
    let entities = sequences
        .iter()
        .enumerate()
        .map(|(sent_id, sequence)| {
            let tokens = Tokens::new(sequence, scheme, suffix, delimiter)?;
            tokens.entities(sent_id)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Entities(entities))
}

#[derive(Debug, Clone, PartialEq)]
/// Parsed tokens of a single sequence, followed by an outside token.
struct Tokens<'a> {
    extended_tokens: Vec<Token<'a>>,
    scheme: SchemeType,
}

impl<'a> Tokens<'a> {
    fn new(
        sequence: &[&'a str],
        scheme: SchemeType,
        suffix: bool,
        delimiter: char,
    ) -> Result<Self, ParsingError> {
        let mut extended_tokens = sequence
            .iter()
            .map(|t| Token::try_new(t, suffix, delimiter))
            .collect::<Result<Vec<_>, _>>()?;
        extended_tokens.push(Token::OUTSIDE);
        Ok(Self {
            extended_tokens,
            scheme,
        })
    }

    fn entities(&self, sent_id: usize) -> Result<Vec<Entity<'a>>, ConversionError> {
        let mut entities = Vec::new();
        let mut prev = Token::OUTSIDE;
        let mut i = 0;
        while i < self.extended_tokens.len() {
            let token = self.extended_tokens[i];
            if !token.is_valid(self.scheme) {
                return Err(InvalidToken(token.token.to_string()).into());
            }
            if token.is_start(&prev, self.scheme) {
                let end = self.forward(i + 1, token);
                if self.is_end(end) {
                    entities.push(Entity::new(sent_id, i, end, token.tag));
                }
                i = end;
            } else {
                i += 1;
            }
            prev = self.extended_tokens[i - 1];
        }
        Ok(entities)
    }

    /// Returns the index of the first token after `start` that is not inside the chunk opened by
    /// `prev`.
    fn forward(&self, start: usize, mut prev: Token<'a>) -> usize {
        for (i, current) in self.extended_tokens.iter().enumerate().skip(start) {
            if current.is_inside(&prev, self.scheme) {
                prev = *current;
            } else {
                return i;
            }
        }
        // The trailing outside token is never inside a chunk.
        self.extended_tokens.len() - 1
    }

    /// Whether the token at `i - 1` closes a chunk.
    fn is_end(&self, i: usize) -> bool {
        let token = &self.extended_tokens[i];
        let prev = &self.extended_tokens[i - 1];
        token.is_end(prev, self.scheme)
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
/// Entities found in a list of sequences, grouped by sequence.
pub struct Entities<'a>(Vec<Vec<Entity<'a>>>);

impl<'a> Entities<'a> {
    /// Consumes the 2D array of vecs and builds the Entities.
    pub fn new(entities: Vec<Vec<Entity<'a>>>) -> Self {
        Entities(entities)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity<'a>> {
        self.0.iter().flatten()
    }

    pub fn sequences(&self) -> &[Vec<Entity<'a>>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Vec::is_empty)
    }

    pub fn unique_tags(&self) -> AHashSet<&'a str> {
        self.iter().map(|e| e.tag).collect()
    }

    /// Groups the `(sent_id, start, end)` spans by tag. Duplicated spans are counted once.
    pub(crate) fn spans_by_tag(&self) -> AHashMap<&'a str, AHashSet<(usize, usize, usize)>> {
        let mut spans: AHashMap<&'a str, AHashSet<(usize, usize, usize)>> = AHashMap::default();
        for e in self.iter() {
            spans
                .entry(e.tag)
                .or_default()
                .insert((e.sent_id, e.start, e.end));
        }
        spans
    }
}

impl<'a> IntoIterator for Entities<'a> {
    type Item = Entity<'a>;
    type IntoIter = std::iter::Flatten<std::vec::IntoIter<Vec<Entity<'a>>>>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter().flatten()
    }
}
