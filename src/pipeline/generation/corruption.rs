//! Value and predicate-field corruption applied by the generator.
//!
//! Every function takes the random source explicitly so a seeded generator
//! reproduces the same dirty population.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::OCR_CONFUSION;
use crate::domain::Condition;

/// Digit-to-misreads table. Characters without an entry pass through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DigitConfusion {
    table: BTreeMap<char, Vec<char>>,
}

impl Default for DigitConfusion {
    fn default() -> Self {
        Self {
            table: OCR_CONFUSION
                .iter()
                .map(|(digit, choices)| (*digit, choices.to_vec()))
                .collect(),
        }
    }
}

impl DigitConfusion {
    pub fn new(table: BTreeMap<char, Vec<char>>) -> Self {
        Self { table }
    }

    /// Misread a single character
    pub fn confuse_char<R: Rng + ?Sized>(&self, ch: char, rng: &mut R) -> char {
        self.table
            .get(&ch)
            .and_then(|choices| choices.choose(rng))
            .copied()
            .unwrap_or(ch)
    }

    /// Misread every character of `value` that has a table entry
    pub fn confuse<R: Rng + ?Sized>(&self, value: &str, rng: &mut R) -> String {
        value.chars().map(|ch| self.confuse_char(ch, rng)).collect()
    }
}

/// How the numeric field is corrupted once the value-error draw fires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueCorruption {
    /// Confuse every digit of the value's text
    #[default]
    OcrDigits,
    /// Confuse the four-digit year prefix of a date
    YearDigits { per_digit_prob: f64 },
}

impl ValueCorruption {
    pub fn apply<R: Rng + ?Sized>(
        &self,
        value: &str,
        confusion: &DigitConfusion,
        rng: &mut R,
    ) -> String {
        match self {
            ValueCorruption::OcrDigits => confusion.confuse(value, rng),
            ValueCorruption::YearDigits { per_digit_prob } => {
                corrupt_year(value, *per_digit_prob, confusion, rng)
            }
        }
    }
}

/// Confuse the year of an ISO-like date.
///
/// Only the first character is gated by `per_digit_prob`; the remaining
/// three year digits are always confused. Dates shorter than four
/// characters come back unchanged.
pub fn corrupt_year<R: Rng + ?Sized>(
    date: &str,
    per_digit_prob: f64,
    confusion: &DigitConfusion,
    rng: &mut R,
) -> String {
    // TODO: decide with the data owners whether digits 2-4 should also be gated by per_digit_prob
    let Some(year) = date.get(..4) else {
        return date.to_string();
    };
    let rest = &date[4..];

    let mut changed = false;
    let mut new_year = String::with_capacity(4);
    for (i, ch) in year.chars().enumerate() {
        if !ch.is_ascii_digit() {
            new_year.push(ch);
            continue;
        }
        if i == 0 && rng.gen::<f64>() > per_digit_prob {
            new_year.push(ch);
        } else {
            new_year.push(confusion.confuse_char(ch, rng));
            changed = true;
        }
    }

    if !changed {
        return date.to_string();
    }
    new_year.push_str(rest);
    new_year
}

/// Replacement rule for one categorical predicate field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredicateCorruption {
    #[default]
    None,
    /// Draw a replacement uniformly from a fixed alphabet
    Alphabet { field: usize, alphabet: Vec<String> },
    /// Binary rule: a value equal to `when` becomes `to`, anything else `otherwise`
    Flip {
        field: usize,
        when: String,
        to: String,
        otherwise: String,
    },
}

impl PredicateCorruption {
    pub fn field(&self) -> Option<usize> {
        match self {
            PredicateCorruption::None => None,
            PredicateCorruption::Alphabet { field, .. }
            | PredicateCorruption::Flip { field, .. } => Some(*field),
        }
    }

    /// Rewrite the target field in place. Returns whether a rule was applied,
    /// which marks the row as changed even when the drawn value is the same.
    pub fn apply<R: Rng + ?Sized>(&self, fields: &mut [String], rng: &mut R) -> bool {
        match self {
            PredicateCorruption::None => false,
            PredicateCorruption::Alphabet { field, alphabet } => {
                let (Some(slot), Some(choice)) = (fields.get_mut(*field), alphabet.choose(rng))
                else {
                    return false;
                };
                *slot = choice.clone();
                true
            }
            PredicateCorruption::Flip { field, when, to, otherwise } => {
                let is_match = Condition { field: *field, equals: when.clone() }.matches(fields);
                let Some(slot) = fields.get_mut(*field) else {
                    return false;
                };
                *slot = if is_match { to.clone() } else { otherwise.clone() };
                true
            }
        }
    }
}
