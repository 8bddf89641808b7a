//! BERT-style vocabulary and WordPiece tokenizer.
//!
//! Produces the fixed-length `input_ids` / `attention_mask` /
//! `token_type_ids` triple expected by the bundled sentence models:
//! `[CLS] tokens… [SEP] [PAD]…`, single segment.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::errors::{EmbeddingError, Result};

/// Continuation marker for non-initial WordPiece pieces.
const CONTINUATION_PREFIX: &str = "##";

/// Default ids used when the vocabulary lacks a special token.
const DEFAULT_CLS_ID: u32 = 101;
const DEFAULT_SEP_ID: u32 = 102;
const DEFAULT_PAD_ID: u32 = 0;
const DEFAULT_UNK_ID: u32 = 100;

/// Immutable token ↔ id mapping loaded from `vocab.txt`.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    tokens: Vec<String>,
    ids: HashMap<String, u32>,
    cls_id: u32,
    sep_id: u32,
    pad_id: u32,
    unk_id: u32,
    max_token_chars: usize,
}

impl Vocabulary {
    /// Load a newline-delimited vocabulary. Line index is the token id.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EmbeddingError::Load(format!("vocabulary {}: {e}", path.display()))
        })?;
        let vocab = Self::from_tokens(content.lines().map(str::trim));
        debug!(path = %path.display(), size = vocab.len(), "vocabulary loaded");
        Ok(vocab)
    }

    /// Build a vocabulary from tokens in id order.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let mut ids = HashMap::with_capacity(tokens.len());
        for (idx, token) in tokens.iter().enumerate() {
            let _ = ids.insert(token.clone(), idx as u32);
        }
        let lookup = |token: &str, fallback: u32| ids.get(token).copied().unwrap_or(fallback);
        let cls_id = lookup("[CLS]", DEFAULT_CLS_ID);
        let sep_id = lookup("[SEP]", DEFAULT_SEP_ID);
        let pad_id = lookup("[PAD]", DEFAULT_PAD_ID);
        let unk_id = lookup("[UNK]", DEFAULT_UNK_ID);
        let max_token_chars = tokens.iter().map(|t| t.chars().count()).max().unwrap_or(0);
        Self {
            tokens,
            ids,
            cls_id,
            sep_id,
            pad_id,
            unk_id,
            max_token_chars,
        }
    }

    /// Id of a token, if present.
    pub fn id(&self, token: &str) -> Option<u32> {
        self.ids.get(token).copied()
    }

    /// Token string for an id, if present.
    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    /// Number of lines in the vocabulary.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the vocabulary has no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// `[CLS]` id.
    pub fn cls_id(&self) -> u32 {
        self.cls_id
    }

    /// `[SEP]` id.
    pub fn sep_id(&self) -> u32 {
        self.sep_id
    }

    /// `[PAD]` id.
    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    /// `[UNK]` id.
    pub fn unk_id(&self) -> u32 {
        self.unk_id
    }

    /// Character length of the longest entry, `##` prefix included.
    pub fn max_token_chars(&self) -> usize {
        self.max_token_chars
    }
}

/// Three parallel fixed-length model inputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenizedSequence {
    /// Token ids, framed by `[CLS]`/`[SEP]` and padded with `[PAD]`.
    pub input_ids: Vec<u32>,
    /// 1 for real tokens, 0 for padding.
    pub attention_mask: Vec<u8>,
    /// Segment ids (always 0).
    pub token_type_ids: Vec<u8>,
}

impl TokenizedSequence {
    /// Fixed sequence length.
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    /// Whether the sequence has zero positions.
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Number of non-padding positions.
    pub fn real_len(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m == 1).count()
    }
}

/// WordPiece tokenizer over a shared [`Vocabulary`].
#[derive(Clone, Debug)]
pub struct Tokenizer {
    vocab: Arc<Vocabulary>,
    max_length: usize,
}

impl Tokenizer {
    /// Create a tokenizer emitting sequences of `max_length` positions.
    pub fn new(vocab: Arc<Vocabulary>, max_length: usize) -> Result<Self> {
        if max_length < 2 {
            return Err(EmbeddingError::Config(format!(
                "max_length {max_length} leaves no room for [CLS] and [SEP]"
            )));
        }
        Ok(Self { vocab, max_length })
    }

    /// The underlying vocabulary.
    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Fixed output length.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Tokenize text into a fixed-length framed sequence.
    pub fn tokenize(&self, text: &str) -> TokenizedSequence {
        let budget = self.max_length - 2;
        let normalized = text.trim().to_lowercase();

        let mut pieces = Vec::new();
        for word in normalized.split_whitespace() {
            if pieces.len() >= budget {
                break;
            }
            match self.vocab.id(word) {
                Some(id) => pieces.push(id),
                None => self.wordpiece(word, &mut pieces, budget),
            }
        }
        pieces.truncate(budget);

        let mut input_ids = Vec::with_capacity(self.max_length);
        input_ids.push(self.vocab.cls_id());
        input_ids.extend_from_slice(&pieces);
        input_ids.push(self.vocab.sep_id());
        let real = input_ids.len();

        input_ids.resize(self.max_length, self.vocab.pad_id());
        let mut attention_mask = vec![1u8; real];
        attention_mask.resize(self.max_length, 0);

        TokenizedSequence {
            input_ids,
            attention_mask,
            token_type_ids: vec![0; self.max_length],
        }
    }

    /// Greedy longest-match-first subword split of a single word.
    ///
    /// A position where no piece matches emits `[UNK]` for one character.
    /// Candidates never exceed the longest vocabulary entry, and the split
    /// stops once `out` holds `budget` ids.
    fn wordpiece(&self, word: &str, out: &mut Vec<u32>, budget: usize) {
        let bounds: Vec<usize> = word
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(word.len()))
            .collect();
        let chars = bounds.len() - 1;

        let mut candidate = String::with_capacity(word.len() + CONTINUATION_PREFIX.len());
        let max_piece = self.vocab.max_token_chars();
        let mut start = 0;
        while start < chars && out.len() < budget {
            let mut end = chars.min(start + max_piece);
            let mut matched = None;
            while start < end {
                candidate.clear();
                if start > 0 {
                    candidate.push_str(CONTINUATION_PREFIX);
                }
                candidate.push_str(&word[bounds[start]..bounds[end]]);
                if let Some(id) = self.vocab.id(&candidate) {
                    matched = Some(id);
                    break;
                }
                end -= 1;
            }

            match matched {
                Some(id) => {
                    out.push(id);
                    start = end;
                }
                None => {
                    out.push(self.vocab.unk_id());
                    start += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_vocab() -> Arc<Vocabulary> {
        Arc::new(Vocabulary::from_tokens([
            "[CLS]", "[SEP]", "[PAD]", "[UNK]", "turn", "on", "wifi",
        ]))
    }

    fn wordpiece_vocab() -> Arc<Vocabulary> {
        Arc::new(Vocabulary::from_tokens([
            "[PAD]", "[UNK]", "[CLS]", "[SEP]", "blue", "##tooth", "##t", "un", "##able", "open",
        ]))
    }

    #[test]
    fn turn_on_wifi_scenario() {
        let tok = Tokenizer::new(small_vocab(), 8).unwrap();
        let seq = tok.tokenize("turn on wifi");
        assert_eq!(seq.input_ids, vec![0, 4, 5, 6, 1, 2, 2, 2]);
        assert_eq!(seq.attention_mask, vec![1, 1, 1, 1, 1, 0, 0, 0]);
        assert_eq!(seq.token_type_ids, vec![0; 8]);
    }

    #[test]
    fn lowercases_and_trims() {
        let tok = Tokenizer::new(small_vocab(), 8).unwrap();
        let a = tok.tokenize("  TURN On  WiFi \n");
        let b = tok.tokenize("turn on wifi");
        assert_eq!(a, b);
    }

    #[test]
    fn empty_text_is_cls_sep() {
        let tok = Tokenizer::new(small_vocab(), 6).unwrap();
        let seq = tok.tokenize("   ");
        assert_eq!(seq.input_ids, vec![0, 1, 2, 2, 2, 2]);
        assert_eq!(seq.real_len(), 2);
    }

    #[test]
    fn wordpiece_longest_match_with_continuation() {
        let tok = Tokenizer::new(wordpiece_vocab(), 8).unwrap();
        let seq = tok.tokenize("bluetooth");
        // blue + ##tooth, not blue + ##t + ...
        assert_eq!(&seq.input_ids[..4], &[2, 4, 5, 3]);
    }

    #[test]
    fn wordpiece_unknown_char_emits_unk_and_resumes() {
        let tok = Tokenizer::new(wordpiece_vocab(), 10).unwrap();
        // x, ##u and ##n have no piece; ##able matches from position 3.
        let seq = tok.tokenize("xunable");
        assert_eq!(&seq.input_ids[..6], &[2, 1, 1, 1, 8, 3]);
    }

    #[test]
    fn wordpiece_initial_piece_has_no_prefix() {
        let tok = Tokenizer::new(wordpiece_vocab(), 8).unwrap();
        let seq = tok.tokenize("unable");
        assert_eq!(&seq.input_ids[..4], &[2, 7, 8, 3]);
    }

    #[test]
    fn wordpiece_multibyte_chars_do_not_split() {
        let vocab = Arc::new(Vocabulary::from_tokens([
            "[PAD]", "[UNK]", "[CLS]", "[SEP]", "caf", "##é",
        ]));
        let tok = Tokenizer::new(vocab, 6).unwrap();
        let seq = tok.tokenize("Café");
        assert_eq!(&seq.input_ids[..4], &[2, 4, 5, 3]);
    }

    #[test]
    fn truncates_to_budget_and_keeps_sep() {
        let tok = Tokenizer::new(small_vocab(), 5).unwrap();
        let seq = tok.tokenize("turn on wifi turn on wifi");
        assert_eq!(seq.input_ids, vec![0, 4, 5, 6, 1]);
        assert_eq!(seq.attention_mask, vec![1; 5]);
    }

    #[test]
    fn truncation_applies_after_wordpiece_expansion() {
        let tok = Tokenizer::new(wordpiece_vocab(), 4).unwrap();
        let seq = tok.tokenize("bluetooth open");
        assert_eq!(seq.input_ids, vec![2, 4, 5, 3]);
    }

    #[test]
    fn very_long_unmatched_word_fills_budget_with_unk() {
        let tok = Tokenizer::new(wordpiece_vocab(), 128).unwrap();
        let seq = tok.tokenize(&"x".repeat(10_000));
        assert_eq!(seq.input_ids[0], 2);
        assert!(seq.input_ids[1..127].iter().all(|&id| id == 1));
        assert_eq!(seq.input_ids[127], 3);
        assert_eq!(seq.real_len(), 128);
    }

    #[test]
    fn very_long_word_still_matches_pieces() {
        let tok = Tokenizer::new(wordpiece_vocab(), 8).unwrap();
        let word = format!("blue{}", "tooth".repeat(5_000));
        let seq = tok.tokenize(&word);
        assert_eq!(seq.input_ids, vec![2, 4, 5, 5, 5, 5, 5, 3]);
    }

    #[test]
    fn max_token_chars_counts_prefix() {
        assert_eq!(wordpiece_vocab().max_token_chars(), 7);
        assert_eq!(Vocabulary::from_tokens(Vec::<String>::new()).max_token_chars(), 0);
    }

    #[test]
    fn rejects_max_length_below_two() {
        let err = Tokenizer::new(small_vocab(), 1).unwrap_err();
        assert!(matches!(err, EmbeddingError::Config(_)));
    }

    #[test]
    fn missing_special_tokens_use_bert_defaults() {
        let vocab = Vocabulary::from_tokens(["hello", "world"]);
        assert_eq!(vocab.cls_id(), 101);
        assert_eq!(vocab.sep_id(), 102);
        assert_eq!(vocab.pad_id(), 0);
        assert_eq!(vocab.unk_id(), 100);
    }

    #[test]
    fn load_from_file_uses_line_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        std::fs::write(&path, "[PAD]\r\n[UNK]\n[CLS]\n[SEP]\nhello\n").unwrap();
        let vocab = Vocabulary::load(&path).unwrap();
        assert_eq!(vocab.len(), 5);
        assert_eq!(vocab.id("hello"), Some(4));
        assert_eq!(vocab.id("[PAD]"), Some(0));
        assert_eq!(vocab.token(2), Some("[CLS]"));
        assert_eq!(vocab.cls_id(), 2);
    }

    #[test]
    fn load_missing_file_is_load_error() {
        let err = Vocabulary::load(Path::new("/nonexistent/vocab.txt")).unwrap_err();
        assert!(matches!(err, EmbeddingError::Load(_)));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn sequence_invariants(text in "\\PC{0,200}") {
                let tok = Tokenizer::new(wordpiece_vocab(), 128).unwrap();
                let seq = tok.tokenize(&text);
                let vocab = tok.vocab();

                prop_assert_eq!(seq.input_ids.len(), 128);
                prop_assert_eq!(seq.attention_mask.len(), 128);
                prop_assert_eq!(seq.token_type_ids.len(), 128);
                prop_assert_eq!(seq.input_ids[0], vocab.cls_id());

                let real = seq.real_len();
                prop_assert!(real >= 2);
                prop_assert!(seq.attention_mask[..real].iter().all(|&m| m == 1));
                prop_assert!(seq.attention_mask[real..].iter().all(|&m| m == 0));
                prop_assert_eq!(seq.input_ids[real - 1], vocab.sep_id());
                prop_assert!(seq.input_ids[real..].iter().all(|&id| id == vocab.pad_id()));
                prop_assert!(seq.token_type_ids.iter().all(|&t| t == 0));
            }

            #[test]
            fn tokenize_is_pure(text in "[a-z ]{0,64}") {
                let tok = Tokenizer::new(wordpiece_vocab(), 32).unwrap();
                prop_assert_eq!(tok.tokenize(&text), tok.tokenize(&text));
            }
        }
    }
}
