use async_trait::async_trait;
use maestro_agent::TextCompletion;
use maestro_core::MaestroResult;
use std::sync::Arc;
use tracing::{debug, warn};

/// Decides whether a query is a plain greeting that can skip planning.
#[async_trait]
pub trait QueryClassifier: Send + Sync {
    /// Whether `query` should go straight to the greeting worker.
    async fn is_greeting(&self, query: &str) -> MaestroResult<bool>;
}

const DEFAULT_GREETINGS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "hiya",
    "howdy",
    "greetings",
    "good morning",
    "good afternoon",
    "good evening",
    "good day",
    "how are you",
    "what's up",
];

/// Deterministic classifier: a short query whose leading words are a known
/// greeting phrase.
///
/// `"Hello!"` and `"hi there"` are greetings; `"Hello, what is the sentiment
/// of this review?"` is too long to be one.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    phrases: Vec<Vec<String>>,
    max_words: usize,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_GREETINGS.iter().copied(), 4)
    }
}

impl KeywordClassifier {
    /// Match against `phrases`, for queries of at most `max_words` words.
    pub fn new<I, S>(phrases: I, max_words: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| words(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases, max_words }
    }

    /// Synchronous form of [`QueryClassifier::is_greeting`].
    pub fn classify(&self, query: &str) -> bool {
        let words = words(query);
        if words.is_empty() || words.len() > self.max_words {
            return false;
        }
        self.phrases.iter().any(|phrase| words.starts_with(phrase))
    }
}

#[async_trait]
impl QueryClassifier for KeywordClassifier {
    async fn is_greeting(&self, query: &str) -> MaestroResult<bool> {
        Ok(self.classify(query))
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

const CLASSIFY_PROMPT: &str = "Is the following user message only a greeting or small talk, \
with no task or question to delegate? Answer with exactly one word: yes or no.\n\nMessage: \"{query}\"";

/// Asks the completion collaborator for a yes/no verdict.
///
/// An answer that is neither yes nor no counts as "not a greeting", so the
/// query goes to the planner.
pub struct ModelClassifier {
    completion: Arc<dyn TextCompletion>,
}

impl ModelClassifier {
    /// Classify through `completion`.
    pub fn new(completion: Arc<dyn TextCompletion>) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl QueryClassifier for ModelClassifier {
    async fn is_greeting(&self, query: &str) -> MaestroResult<bool> {
        let answer = self
            .completion
            .complete(&CLASSIFY_PROMPT.replace("{query}", query))
            .await?;
        let verdict = answer
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();

        let greeting = if verdict.starts_with("yes") {
            true
        } else if verdict.starts_with("no") {
            false
        } else {
            warn!(answer = %answer.trim(), "Unrecognized classifier verdict, treating as not a greeting");
            false
        };
        debug!(greeting, "Query classified");
        Ok(greeting)
    }
}
