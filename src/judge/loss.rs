//! Comprehension loss from the student's yes/no token distribution.

use serde::{Deserialize, Serialize};

use crate::llm::Token;

/// Probability floor applied before taking logs.
pub const PROB_FLOOR: f64 = 1e-3;

/// Loss assigned when an edge cannot be judged: the cross-entropy of a
/// verdict that put only `PROB_FLOOR` on the correct answer.
pub const FALLBACK_LOSS: f64 = 6.907_755_278_982_137; // -ln(1e-3)

/// Ground-truth verdict for a statement variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Yes,
    No,
}

/// Probability mass on "yes" and "no" among a token's top candidates.
/// Candidate text is matched case-insensitively after trimming.
fn yes_no_mass(candidates: &[Token]) -> (f64, f64) {
    let mut yes = 0.0;
    let mut no = 0.0;
    for c in candidates {
        match c.text.trim().to_lowercase().as_str() {
            "yes" => yes += c.prob,
            "no" => no += c.prob,
            _ => {}
        }
    }
    (yes, no)
}

/// Normalized probability the student gives to `label`.
/// `None` when neither "yes" nor "no" appears among the candidates.
pub fn label_probability(candidates: &[Token], label: Label) -> Option<f64> {
    let (yes, no) = yes_no_mass(candidates);
    let total = yes + no;
    if total <= 0.0 {
        return None;
    }
    Some(match label {
        Label::Yes => yes / total,
        Label::No => no / total,
    })
}

/// Mean cross-entropy over `(first-token candidates, true label)` pairs.
/// `None` when `judgements` is empty or any judgement lacks a yes/no candidate.
pub fn yes_no_loss(judgements: &[(Vec<Token>, Label)]) -> Option<f64> {
    if judgements.is_empty() {
        return None;
    }
    let mut total = 0.0;
    for (candidates, label) in judgements {
        let p = label_probability(candidates, *label)?;
        total += -p.max(PROB_FLOOR).ln();
    }
    Some(total / judgements.len() as f64)
}
