//! OpenRouter chat-completions backend.

use super::{Oracle, OracleFuture, check_prompt};
use crate::error::OracleError;
use crate::tokens::{RequestBudget, TokenEstimator};
use crate::{ChatRequest, Message, OpenRouterClient};

/// HTTP statuses that mean "this request will never succeed as sent".
const REJECTION_STATUSES: [u16; 3] = [400, 413, 422];

/// [`Oracle`] backed by one OpenRouter model.
///
/// Sends each prompt as a single user message. Sizes are estimated with a
/// [`TokenEstimator`]; the budget comes from the model's context window minus
/// request overhead and the reserved response tokens.
pub struct OpenRouterOracle {
    client: OpenRouterClient,
    model: String,
    estimator: TokenEstimator,
    budget: RequestBudget,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl OpenRouterOracle {
    pub fn new(client: OpenRouterClient, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client,
            budget: RequestBudget::for_model(&model),
            model,
            estimator: TokenEstimator::default(),
            max_tokens: None,
            temperature: None,
        }
    }

    /// Cap the response length and reserve that many tokens of the budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self.budget = self.budget.with_output_reserve(max_tokens as usize);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Override the context window looked up from the model name.
    pub fn with_context_window(mut self, tokens: usize) -> Self {
        self.budget = self.budget.with_context_window(tokens);
        self
    }

    pub fn with_estimator(mut self, estimator: TokenEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Oracle for OpenRouterOracle {
    fn answer(&self, prompt: &str) -> OracleFuture<'_> {
        let prompt = prompt.to_string();
        Box::pin(async move {
            check_prompt(&prompt)?;

            let body = ChatRequest {
                model: self.model.clone(),
                messages: vec![Message::user(prompt.as_str())],
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            };

            match self.client.chat(&body).await {
                Ok(completion) => completion.content.ok_or_else(|| {
                    OracleError::transport(format!("empty response from {}", self.model))
                }),
                Err(e) => Err(classify(e, self.measure(&prompt))),
            }
        })
    }

    fn measure(&self, text: &str) -> usize {
        self.estimator.estimate(text)
    }

    fn budget(&self) -> usize {
        self.budget.max_prompt_tokens()
    }

    fn identity(&self) -> String {
        format!("OpenRouter({})", self.model)
    }
}

/// Turn capacity and validation failures into [`OracleError::Rejected`],
/// enriched with the locally computed prompt size. Everything else passes
/// through unchanged.
fn classify(err: OracleError, prompt_tokens: usize) -> OracleError {
    match err {
        OracleError::Transport {
            message,
            status: Some(status),
        } if REJECTION_STATUSES.contains(&status) => OracleError::Rejected {
            message,
            prompt_tokens,
        },
        OracleError::Transport {
            message,
            status: None,
        } if mentions_context_limit(&message) => OracleError::Rejected {
            message,
            prompt_tokens,
        },
        other => other,
    }
}

fn mentions_context_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["context length", "context_length", "maximum context", "too many tokens"]
        .iter()
        .any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle(model: &str) -> OpenRouterOracle {
        let client = OpenRouterClient::new("test-key").unwrap();
        OpenRouterOracle::new(client, model)
    }

    #[test]
    fn identity_includes_model() {
        assert_eq!(
            oracle("openai/gpt-4").identity(),
            "OpenRouter(openai/gpt-4)"
        );
    }

    #[test]
    fn budget_reserves_overhead_and_output() {
        let o = oracle("openai/gpt-3.5-turbo");
        assert_eq!(o.budget(), 4097 - 8);
        let o = o.with_max_tokens(512);
        assert_eq!(o.budget(), 4097 - 8 - 512);
    }

    #[test]
    fn measure_uses_estimator() {
        let o = oracle("gpt-4").with_estimator(TokenEstimator::with_calibration(Some(1.0)));
        assert_eq!(o.measure("abcd"), 4);
    }

    #[test]
    fn bad_request_becomes_rejection_with_tokens() {
        let err = OracleError::Transport {
            message: "OpenRouter API HTTP 400 Bad Request: too long".into(),
            status: Some(400),
        };
        match classify(err, 4200) {
            OracleError::Rejected { prompt_tokens, .. } => assert_eq!(prompt_tokens, 4200),
            other => panic!("Expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn auth_failure_passes_through() {
        let err = OracleError::Transport {
            message: "OpenRouter API HTTP 401 Unauthorized".into(),
            status: Some(401),
        };
        assert!(matches!(
            classify(err, 10),
            OracleError::Transport {
                status: Some(401),
                ..
            }
        ));
    }

    #[test]
    fn context_limit_message_becomes_rejection() {
        let err = OracleError::transport("This model's maximum context length is 4097 tokens");
        assert!(classify(err, 5000).is_rejected());
    }

    #[tokio::test]
    async fn trivial_prompt_fails_before_request() {
        let o = oracle("openai/gpt-3.5-turbo");
        let err = o.answer("hi").await.unwrap_err();
        assert!(matches!(err, OracleError::TrivialPrompt { len: 2, .. }));
    }
}
