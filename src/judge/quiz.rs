//! Statement variants for an edge description.
//!
//! The set always holds the original statement labeled yes, plus
//! `max_samples - 1` paraphrases (yes) and `max_samples` negations (no),
//! sampled from the teacher at temperature 1 and deduplicated.

use tracing::debug;

use crate::error::AppError;
use crate::judge::loss::Label;
use crate::llm::{GenerateParams, LlmProvider};
use crate::prompts;

pub type Variant = (String, Label);

const SAMPLING_TEMPERATURE: f32 = 1.0;

/// Ask the teacher for paraphrases and negations of `description`.
pub async fn generate_variants(
    teacher: &LlmProvider,
    description: &str,
    max_samples: usize,
) -> Result<Vec<Variant>, AppError> {
    let params = GenerateParams::with_temperature(SAMPLING_TEMPERATURE);
    let mut variants = vec![(description.to_string(), Label::Yes)];

    for _ in 1..max_samples {
        let prompt = prompts::render(prompts::DESCRIPTION_REPHRASING, &[("input_sentence", description)]);
        variants.push((teacher.generate_answer(&prompt, &params).await?, Label::Yes));
    }
    for _ in 0..max_samples {
        let prompt = prompts::render(prompts::ANTI_DESCRIPTION_REPHRASING, &[("input_sentence", description)]);
        variants.push((teacher.generate_answer(&prompt, &params).await?, Label::No));
    }

    let variants = dedup(variants);
    debug!(variants = variants.len(), "statement variants sampled");
    Ok(variants)
}

/// Drop repeated `(text, label)` pairs, keeping first occurrences in order.
fn dedup(variants: Vec<Variant>) -> Vec<Variant> {
    let mut seen = std::collections::HashSet::new();
    variants.into_iter().filter(|v| seen.insert(v.clone())).collect()
}
