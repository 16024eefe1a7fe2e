//! The ordered-line core: shuffle initialization, the reorder operation, and
//! positional grading. Pure data, no I/O; handlers reach it through `AppState`.
//!
//! A `Sequence` is replace-on-write: every mutation returns a new value and
//! leaves the input untouched, so a failed operation can never corrupt the
//! arrangement the user is looking at. The multiset of token ids is fixed at
//! creation; only their order changes.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Token;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReorderError {
    #[error("no token with id {0} in this sequence")]
    NotFound(u32),
    #[error("target position {position} out of range for sequence of length {len}")]
    OutOfRange { position: usize, len: usize },
}

/// The current user-arranged ordering of line tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence(Vec<Token>);

impl Sequence {
    pub fn new(tokens: Vec<Token>) -> Self {
        Sequence(tokens)
    }

    /// Build a Sequence from plain lines in the order given, assigning each
    /// token its index as the id.
    pub fn from_lines(lines: &[String]) -> Self {
        Sequence(
            lines
                .iter()
                .enumerate()
                .map(|(i, text)| Token { id: i as u32, text: text.clone() })
                .collect(),
        )
    }

    /// Build a shuffled Sequence from reference lines. Each token id is the
    /// line's original reference index, assigned once and stable from then on.
    /// Fisher–Yates via `SliceRandom::shuffle`, unbiased over permutations.
    pub fn shuffled<R: Rng>(reference: &[String], rng: &mut R) -> Self {
        use rand::seq::SliceRandom;
        let mut tokens: Vec<Token> = reference
            .iter()
            .enumerate()
            .map(|(i, text)| Token { id: i as u32, text: text.clone() })
            .collect();
        tokens.shuffle(rng);
        Sequence(tokens)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Current position of a token, if present.
    pub fn position_of(&self, token_id: u32) -> Option<usize> {
        self.0.iter().position(|t| t.id == token_id)
    }

    /// Move the token with `token_id` to `target`, shifting the tokens in
    /// between; every other token keeps its relative order. Moving a token to
    /// its current position returns an equal Sequence.
    pub fn reorder(&self, token_id: u32, target: usize) -> Result<Sequence, ReorderError> {
        let from = self
            .position_of(token_id)
            .ok_or(ReorderError::NotFound(token_id))?;
        if target >= self.0.len() {
            return Err(ReorderError::OutOfRange { position: target, len: self.0.len() });
        }
        let mut tokens = self.0.clone();
        let moved = tokens.remove(from);
        tokens.insert(target, moved);
        Ok(Sequence(tokens))
    }

    /// Positional grading against the reference lines: exact string equality
    /// per position, no normalization. When lengths differ, positions beyond
    /// the shorter length are false.
    pub fn match_vector(&self, reference: &[String]) -> Vec<bool> {
        let n = self.0.len().max(reference.len());
        (0..n)
            .map(|i| match (self.0.get(i), reference.get(i)) {
                (Some(tok), Some(line)) => tok.text == *line,
                _ => false,
            })
            .collect()
    }

    /// Full-success condition: same length and every position matches.
    pub fn solves(&self, reference: &[String]) -> bool {
        self.0.len() == reference.len() && self.match_vector(reference).iter().all(|m| *m)
    }

    /// Code preview: the arrangement joined back into one source string.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn lines(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    fn texts(seq: &Sequence) -> Vec<&str> {
        seq.tokens().iter().map(|t| t.text.as_str()).collect()
    }

    fn ids_sorted(seq: &Sequence) -> Vec<u32> {
        let mut ids: Vec<u32> = seq.tokens().iter().map(|t| t.id).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn shuffle_is_a_permutation_of_the_reference() {
        let reference = lines(&["a", "b", "c", "d", "e"]);
        let mut rng = StdRng::seed_from_u64(7);
        let seq = Sequence::shuffled(&reference, &mut rng);

        assert_eq!(seq.len(), reference.len());
        assert_eq!(ids_sorted(&seq), vec![0, 1, 2, 3, 4]);

        let mut shuffled: Vec<String> =
            seq.tokens().iter().map(|t| t.text.clone()).collect();
        shuffled.sort();
        let mut expected = reference.clone();
        expected.sort();
        assert_eq!(shuffled, expected);
    }

    #[test]
    fn shuffle_usually_differs_from_identity() {
        // Probabilistic property: for n=6 the identity comes up 1/720 of the
        // time, so out of 100 trials the large majority must differ.
        let reference = lines(&["a", "b", "c", "d", "e", "f"]);
        let mut rng = StdRng::seed_from_u64(42);
        let identity = Sequence::from_lines(&reference);
        let mut differing = 0;
        for _ in 0..100 {
            if Sequence::shuffled(&reference, &mut rng) != identity {
                differing += 1;
            }
        }
        assert!(differing >= 90, "only {differing}/100 shuffles differed");
    }

    #[test]
    fn shuffle_preserves_id_to_text_binding() {
        let reference = lines(&["x", "y", "z"]);
        let mut rng = StdRng::seed_from_u64(3);
        let seq = Sequence::shuffled(&reference, &mut rng);
        for tok in seq.tokens() {
            assert_eq!(tok.text, reference[tok.id as usize]);
        }
    }

    #[test]
    fn reorder_moves_and_preserves_relative_order() {
        let seq = Sequence::from_lines(&lines(&["a", "b", "c", "d"]));
        let moved = seq.reorder(0, 2).unwrap();
        assert_eq!(texts(&moved), vec!["b", "c", "a", "d"]);
        // input untouched
        assert_eq!(texts(&seq), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn reorder_keeps_length_and_id_multiset() {
        let seq = Sequence::from_lines(&lines(&["a", "b", "c", "d"]));
        let moved = seq.reorder(3, 0).unwrap();
        assert_eq!(moved.len(), seq.len());
        assert_eq!(ids_sorted(&moved), ids_sorted(&seq));
    }

    #[test]
    fn reorder_to_own_position_is_a_no_op() {
        let seq = Sequence::from_lines(&lines(&["a", "b", "c"]));
        let same = seq.reorder(1, 1).unwrap();
        assert_eq!(same, seq);
    }

    #[test]
    fn reorder_is_invertible() {
        let seq = Sequence::from_lines(&lines(&["a", "b", "c", "d", "e"]));
        let original_index = seq.position_of(1).unwrap();
        let there = seq.reorder(1, 4).unwrap();
        let back = there.reorder(1, original_index).unwrap();
        assert_eq!(back, seq);
    }

    #[test]
    fn reorder_unknown_token_fails_without_corruption() {
        let seq = Sequence::from_lines(&lines(&["a", "b"]));
        assert_eq!(seq.reorder(99, 0), Err(ReorderError::NotFound(99)));
        assert_eq!(texts(&seq), vec!["a", "b"]);
    }

    #[test]
    fn reorder_rejects_out_of_range_target() {
        let seq = Sequence::from_lines(&lines(&["a", "b"]));
        assert_eq!(
            seq.reorder(0, 2),
            Err(ReorderError::OutOfRange { position: 2, len: 2 })
        );
    }

    #[test]
    fn match_vector_is_positional() {
        let reference = lines(&["a", "b", "c"]);
        let seq = Sequence::from_lines(&lines(&["a", "x", "c"]));
        assert_eq!(seq.match_vector(&reference), vec![true, false, true]);
        assert!(!seq.solves(&reference));
    }

    #[test]
    fn reference_matches_itself_fully() {
        let reference = lines(&["a", "b", "c"]);
        let seq = Sequence::from_lines(&reference);
        assert_eq!(seq.match_vector(&reference), vec![true, true, true]);
        assert!(seq.solves(&reference));
    }

    #[test]
    fn length_mismatch_pads_with_false() {
        let reference = lines(&["a", "b", "c"]);
        let seq = Sequence::from_lines(&lines(&["a", "b"]));
        assert_eq!(seq.match_vector(&reference), vec![true, true, false]);
        assert!(!seq.solves(&reference));
    }

    #[test]
    fn no_fuzzy_matching_in_the_check() {
        // Whitespace differences are presentation concerns, not match logic.
        let reference = lines(&["\tprint(i)"]);
        let seq = Sequence::from_lines(&lines(&["    print(i)"]));
        assert_eq!(seq.match_vector(&reference), vec![false]);
    }

    #[test]
    fn shuffle_then_solve_scenario() {
        // Reference ["a","b","c"], shuffled to ["c","a","b"]: moving "c"
        // (id 0) from position 0 to position 2 restores the reference order.
        let reference = lines(&["a", "b", "c"]);
        let seq = Sequence::new(vec![
            Token { id: 2, text: "c".into() },
            Token { id: 0, text: "a".into() },
            Token { id: 1, text: "b".into() },
        ]);
        let solved = seq.reorder(2, 2).unwrap();
        assert_eq!(texts(&solved), vec!["a", "b", "c"]);
        assert_eq!(solved.match_vector(&reference), vec![true, true, true]);
    }

    #[test]
    fn render_joins_lines_in_current_order() {
        let seq = Sequence::from_lines(&lines(&["def f():", "    return 1"]));
        assert_eq!(seq.render(), "def f():\n    return 1");
    }
}
