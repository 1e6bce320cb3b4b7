//! Provider backends implementing [`TextCompletion`](crate::TextCompletion).

/// OpenAI-compatible chat completions (OpenAI, OpenRouter, Groq).
pub mod openai;
