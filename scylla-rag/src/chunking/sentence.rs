//! Rule-based sentence segmentation.
//!
//! Sentence candidates come from Unicode sentence boundaries (UAX #29) and
//! are re-joined when a candidate ends with a known abbreviation of the
//! configured language.

use unicode_segmentation::UnicodeSegmentation;

use crate::error::{RagError, Result};

const ENGLISH: &[&str] = &[
    "mr.", "mrs.", "ms.", "dr.", "prof.", "sr.", "jr.", "st.", "vs.", "etc.", "e.g.", "i.e.",
    "inc.", "ltd.", "co.", "fig.", "no.", "approx.", "cf.",
];
const GERMAN: &[&str] =
    &["z.b.", "d.h.", "usw.", "bzw.", "ca.", "dr.", "nr.", "vgl.", "u.a.", "prof.", "str."];
const FRENCH: &[&str] = &["m.", "mme.", "mlle.", "dr.", "etc.", "p.ex.", "cf.", "env.", "av."];
const SPANISH: &[&str] = &["sr.", "sra.", "srta.", "dr.", "etc.", "p.ej.", "ud.", "uds.", "núm."];
const ITALIAN: &[&str] = &["sig.", "dott.", "ecc.", "es.", "prof.", "pag."];
const PORTUGUESE: &[&str] = &["sr.", "sra.", "dr.", "dra.", "etc.", "ex.", "pág."];
const DUTCH: &[&str] = &["dhr.", "mevr.", "bijv.", "enz.", "d.w.z.", "dr.", "blz."];

/// Splits text into sentences for one language.
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    abbreviations: &'static [&'static str],
}

impl SentenceSplitter {
    /// Create a splitter for `language` (an English name or ISO 639-1 code).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ChunkingError`] if no segmentation rules exist for
    /// the language.
    pub fn new(language: &str) -> Result<Self> {
        let abbreviations = match language.trim().to_ascii_lowercase().as_str() {
            "english" | "en" => ENGLISH,
            "german" | "de" => GERMAN,
            "french" | "fr" => FRENCH,
            "spanish" | "es" => SPANISH,
            "italian" | "it" => ITALIAN,
            "portuguese" | "pt" => PORTUGUESE,
            "dutch" | "nl" => DUTCH,
            other => {
                return Err(RagError::ChunkingError(format!(
                    "no sentence segmentation rules for language '{other}'"
                )));
            }
        };
        Ok(Self { abbreviations })
    }

    /// Split `text` into trimmed, non-empty sentences in document order.
    ///
    /// Lines of one paragraph are joined before segmentation, so hard-wrapped
    /// text does not produce sentence breaks at line ends. Blank lines always
    /// end a sentence.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        for paragraph in paragraphs(text) {
            let mut current = String::new();
            for candidate in paragraph.split_sentence_bounds() {
                current.push_str(candidate);
                if !self.ends_with_abbreviation(&current) {
                    flush(&mut current, &mut sentences);
                }
            }
            flush(&mut current, &mut sentences);
        }
        sentences
    }

    fn ends_with_abbreviation(&self, text: &str) -> bool {
        let Some(last_word) = text.split_whitespace().last() else {
            return false;
        };
        self.abbreviations.contains(&last_word.to_lowercase().as_str())
    }
}

fn flush(current: &mut String, sentences: &mut Vec<String>) {
    let sentence = current.trim();
    if !sentence.is_empty() {
        sentences.push(sentence.to_string());
    }
    current.clear();
}

fn paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    paragraphs
}
