//! Dummy LLM provider: deterministic and offline.
//!
//! `generate_answer` echoes the prompt back prefixed with `[echo]` unless a
//! responder function claims the prompt. `generate_topk_per_token` answers a
//! single yes/no token whose probability is derived from a hash of the prompt,
//! so the same statement always gets the same judgement.

use sha2::{Digest, Sha256};

use crate::llm::{GenerateParams, ProviderError, Token};

/// Canned-reply hook: return `Some(reply)` to answer a prompt, `None` to echo.
pub type Responder = fn(&str) -> Option<String>;

#[derive(Debug, Clone, Default)]
pub struct DummyProvider {
    responder: Option<Responder>,
}

impl DummyProvider {
    pub fn with_responder(responder: Responder) -> Self {
        Self { responder: Some(responder) }
    }

    pub async fn generate_answer(
        &self,
        prompt: &str,
        _params: &GenerateParams,
    ) -> Result<String, ProviderError> {
        if let Some(reply) = self.responder.and_then(|r| r(prompt)) {
            return Ok(reply);
        }
        Ok(format!("[echo] {prompt}"))
    }

    pub async fn generate_topk_per_token(&self, prompt: &str) -> Result<Vec<Token>, ProviderError> {
        let p_yes = yes_probability(prompt);
        let yes = Token::new("yes", p_yes);
        let no = Token::new("no", 1.0 - p_yes);
        let (first, second) = if p_yes >= 0.5 { (yes, no) } else { (no, yes) };
        Ok(vec![Token {
            text: first.text.clone(),
            prob: first.prob,
            top_candidates: vec![first, second],
        }])
    }
}

/// Maps the prompt hash onto `[0.05, 0.95]`.
fn yes_probability(prompt: &str) -> f64 {
    let digest = Sha256::digest(prompt.as_bytes());
    0.05 + 0.9 * f64::from(digest[0]) / 255.0
}
