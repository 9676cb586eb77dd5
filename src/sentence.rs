//! Example sentences mark the target word as `*word*`.
//!
//! [`emphasize`] places that marker on sentences that arrive without one. It
//! is a best-effort heuristic based on character overlap and gives no
//! guarantee for inflected forms or words that never appear.

use std::collections::BTreeSet;

use crate::error::Result;

const MARK: char = '*';

/// The sentence without emphasis markers.
pub fn plain_sentence(sentence: &str) -> String {
    sentence.chars().filter(|c| *c != MARK).collect()
}

/// The first `*…*` span of the sentence.
pub fn emphasized_word(sentence: &str) -> Option<&str> {
    let start = sentence.find(MARK)? + MARK.len_utf8();
    let len = sentence[start..].find(MARK)?;
    Some(&sentence[start..start + len]).filter(|w| !w.is_empty())
}

/// Wraps the run of tokens that best matches `word` in markers.
///
/// Sentences that already carry a marker are returned as they are, and so
/// are sentences sharing no character with `word`.
pub fn emphasize(sentence: &str, word: &str) -> String {
    if emphasized_word(sentence).is_some() {
        return sentence.to_string();
    }
    let target: Vec<char> = word.to_lowercase().chars().collect();
    let tokens: Vec<&str> = sentence.split(' ').collect();
    let width = word.split_whitespace().count().max(1);
    if target.is_empty() || tokens.len() < width {
        return sentence.to_string();
    }

    let mut best: Option<(usize, usize)> = None;
    for start in 0..=tokens.len() - width {
        let candidate = tokens[start..start + width].join(" ");
        let candidate: Vec<char> = trim_punctuation(&candidate).to_lowercase().chars().collect();
        let score = longest_common_run(&candidate, &target);
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((start, score));
        }
    }
    let Some((start, _)) = best else {
        return sentence.to_string();
    };

    let mut out: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    let (lead, _) = split_punctuation(tokens[start]);
    out[start] = format!("{}{}{}", lead, MARK, &tokens[start][lead.len()..]);
    let end = start + width - 1;
    let (_, trail) = split_punctuation(&out[end]);
    let body_len = out[end].len() - trail.len();
    out[end] = format!("{}{}{}", &out[end][..body_len], MARK, trail);
    out.join(" ")
}

fn trim_punctuation(s: &str) -> &str {
    s.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Leading and trailing punctuation of a token.
fn split_punctuation(token: &str) -> (String, String) {
    let lead_len = token.len() - token.trim_start_matches(|c: char| !c.is_alphanumeric()).len();
    let trail_len = token.len() - token.trim_end_matches(|c: char| !c.is_alphanumeric()).len();
    if lead_len == token.len() {
        return (String::new(), String::new());
    }
    (
        token[..lead_len].to_string(),
        token[token.len() - trail_len..].to_string(),
    )
}

/// Length of the longest run of characters appearing in both, in order.
fn longest_common_run(a: &[char], b: &[char]) -> usize {
    let mut best = 0;
    let mut prev = vec![0; b.len() + 1];
    for ca in a {
        let mut row = vec![0; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                row[j + 1] = prev[j] + 1;
                best = best.max(row[j + 1]);
            }
        }
        prev = row;
    }
    best
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSentence {
    pub sentence: String,
    pub translation: String,
}

/// Produces an example sentence for a new word, ideally built from words the
/// learner already knows.
pub trait SentenceSource {
    fn generate(
        &self,
        word: &str,
        translation: &str,
        known_words: &BTreeSet<String>,
    ) -> Result<GeneratedSentence>;
}

/// Offline source that always answers with the same template.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateSentences;

impl SentenceSource for TemplateSentences {
    fn generate(
        &self,
        word: &str,
        translation: &str,
        _known_words: &BTreeSet<String>,
    ) -> Result<GeneratedSentence> {
        Ok(GeneratedSentence {
            sentence: format!("El {}{}{} es importante.", MARK, word, MARK),
            translation: format!("The {} is important.", translation),
        })
    }
}

#[test]
fn test_plain_and_emphasized() {
    let s = "Mi *perro* come mucho.";
    assert_eq!(plain_sentence(s), "Mi perro come mucho.");
    assert_eq!(emphasized_word(s), Some("perro"));
    assert_eq!(emphasized_word("Sin marcas."), None);
    assert_eq!(emphasized_word("Un * suelto"), None);
}

#[test]
fn test_emphasize_finds_inflected_form() {
    assert_eq!(
        emphasize("Los perros, en la casa.", "perro"),
        "Los *perros*, en la casa."
    );
    assert_eq!(
        emphasize("¿Dónde está mi Gato?", "gato"),
        "¿Dónde está mi *Gato*?"
    );
}

#[test]
fn test_emphasize_multi_word_target() {
    assert_eq!(
        emphasize("Un café, por favor.", "por favor"),
        "Un café, *por favor*."
    );
}

#[test]
fn test_emphasize_leaves_marked_or_unrelated_sentences() {
    assert_eq!(emphasize("Ya *está*.", "casa"), "Ya *está*.");
    assert_eq!(emphasize("xyz qwk", "año"), "xyz qwk");
}

#[test]
fn test_template_source_marks_the_word() {
    let generated = TemplateSentences
        .generate("agua", "water", &BTreeSet::new())
        .unwrap();
    assert_eq!(emphasized_word(&generated.sentence), Some("agua"));
    assert_eq!(generated.translation, "The water is important.");
}
