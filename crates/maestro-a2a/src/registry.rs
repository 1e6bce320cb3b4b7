use crate::protocol::{AgentCard, AgentSkill};
use maestro_core::{MaestroError, MaestroResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::info;

/// What a worker says it can do, trimmed from its agent card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDescriptor {
    /// Stable skill identifier.
    pub id: String,
    /// Human-readable skill name.
    pub name: String,
    /// What the skill does.
    pub description: String,
    /// Free-form labels.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Sample inputs.
    pub examples: Vec<String>,
}

impl From<&AgentSkill> for SkillDescriptor {
    fn from(skill: &AgentSkill) -> Self {
        Self {
            id: skill.id.clone(),
            name: skill.name.clone(),
            description: skill.description.clone(),
            tags: skill.tags.clone(),
            examples: skill.examples.clone(),
        }
    }
}

/// A registered worker: its routing name, network address and advertised
/// capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    /// Routing name, unique within a registry.
    pub name: String,
    /// Base URL of the worker's JSON-RPC endpoint.
    pub address: String,
    /// What the worker does.
    #[serde(default)]
    pub description: String,
    /// Version from the agent card.
    #[serde(default)]
    pub version: String,
    /// Accepted input media types.
    #[serde(default)]
    pub input_modes: Vec<String>,
    /// Produced output media types.
    #[serde(default)]
    pub output_modes: Vec<String>,
    /// Advertised skills, in card order.
    #[serde(default)]
    pub skills: Vec<SkillDescriptor>,
    /// Whether the worker accepts `message/stream`.
    #[serde(default)]
    pub streaming: bool,
}

impl WorkerDescriptor {
    /// A descriptor with only a name and address, text in and text out.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            description: String::new(),
            version: String::new(),
            input_modes: vec!["text".to_string()],
            output_modes: vec!["text".to_string()],
            skills: Vec::new(),
            streaming: false,
        }
    }

    /// Build a descriptor from a fetched agent card, routed under `name`.
    pub fn from_card(name: impl Into<String>, card: &AgentCard) -> Self {
        Self {
            name: name.into(),
            address: card.url.clone(),
            description: card.description.clone(),
            version: card.version.clone(),
            input_modes: card.default_input_modes.clone(),
            output_modes: card.default_output_modes.clone(),
            skills: card.skills.iter().map(SkillDescriptor::from).collect(),
            streaming: card.capabilities.streaming,
        }
    }

    /// Sets whether `message/stream` is used.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// JSON-RPC endpoint of the worker, always ending in `/`.
    pub fn endpoint(&self) -> String {
        if self.address.ends_with('/') {
            self.address.clone()
        } else {
            format!("{}/", self.address)
        }
    }
}

/// Maps worker names to descriptors.
///
/// Names are unique. The registry is usually filled once at startup and read
/// concurrently afterwards; reads never block each other.
#[derive(Default)]
pub struct CapabilityRegistry {
    workers: RwLock<HashMap<String, Arc<WorkerDescriptor>>>,
}

impl CapabilityRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `(name, address)` pairs.
    pub fn from_addresses<I, N, A>(entries: I) -> MaestroResult<Self>
    where
        I: IntoIterator<Item = (N, A)>,
        N: Into<String>,
        A: Into<String>,
    {
        let registry = Self::new();
        for (name, address) in entries {
            registry.register(WorkerDescriptor::new(name, address))?;
        }
        Ok(registry)
    }

    /// Add a worker. Fails with `DuplicateWorker` if the name is taken and
    /// with `Config` if the name is empty or the address is not an http(s) URL.
    pub fn register(&self, descriptor: WorkerDescriptor) -> MaestroResult<()> {
        if descriptor.name.trim().is_empty() {
            return Err(MaestroError::Config("worker name must not be empty".into()));
        }
        validate_address(&descriptor.address)?;

        let mut workers = self.workers.write();
        if workers.contains_key(&descriptor.name) {
            return Err(MaestroError::DuplicateWorker(descriptor.name));
        }
        info!(worker = %descriptor.name, address = %descriptor.address, "Registered worker");
        workers.insert(descriptor.name.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Look up a worker by exact name.
    pub fn resolve(&self, name: &str) -> MaestroResult<Arc<WorkerDescriptor>> {
        self.workers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| MaestroError::UnknownWorker(name.to_string()))
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.workers.read().contains_key(name)
    }

    /// All registered names, sorted.
    pub fn list_names(&self) -> BTreeSet<String> {
        self.workers.read().keys().cloned().collect()
    }

    /// All descriptors, sorted by name.
    pub fn descriptors(&self) -> Vec<Arc<WorkerDescriptor>> {
        let mut all: Vec<_> = self.workers.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.workers.read().len()
    }

    /// True when no worker is registered.
    pub fn is_empty(&self) -> bool {
        self.workers.read().is_empty()
    }
}

fn validate_address(address: &str) -> MaestroResult<()> {
    let parsed = reqwest::Url::parse(address)
        .map_err(|e| MaestroError::Config(format!("invalid worker address '{address}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(MaestroError::Config(format!(
            "unsupported scheme '{other}' in worker address '{address}'"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::protocol::AgentCapabilities;

    fn default_registry() -> CapabilityRegistry {
        CapabilityRegistry::from_addresses([
            ("planner", "http://localhost:8001/"),
            ("greeting", "http://localhost:8002/"),
            ("sentiment", "http://localhost:8003/"),
        ])
        .unwrap()
    }

    #[test]
    fn test_resolve_registered() {
        let registry = default_registry();
        let worker = registry.resolve("sentiment").unwrap();
        assert_eq!(worker.address, "http://localhost:8003/");
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_resolve_returns_registered_descriptor_unchanged() {
        let mut descriptor = WorkerDescriptor::new("pos_tagger", "http://localhost:8004/");
        descriptor.description = "Part-of-speech tagging".into();
        descriptor.version = "2.1.0".into();
        descriptor.streaming = true;
        descriptor.skills = vec![SkillDescriptor {
            id: "pos".into(),
            name: "POS tags".into(),
            description: "Tags every token".into(),
            tags: vec!["nlp".into(), "pos".into()],
            examples: vec!["I love this".into()],
        }];

        let registry = CapabilityRegistry::new();
        registry.register(descriptor.clone()).unwrap();
        assert_eq!(*registry.resolve(&descriptor.name).unwrap(), descriptor);
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = default_registry();
        let err = registry.resolve("translator").unwrap_err();
        assert!(matches!(err, MaestroError::UnknownWorker(ref n) if n == "translator"));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let registry = default_registry();
        assert!(registry.resolve("Sentiment").is_err());
    }

    #[test]
    fn test_duplicate_rejected_and_original_kept() {
        let registry = default_registry();
        let err = registry
            .register(WorkerDescriptor::new("greeting", "http://localhost:9999/"))
            .unwrap_err();
        assert!(matches!(err, MaestroError::DuplicateWorker(ref n) if n == "greeting"));
        assert_eq!(
            registry.resolve("greeting").unwrap().address,
            "http://localhost:8002/"
        );
    }

    #[test]
    fn test_invalid_entries_rejected() {
        let registry = CapabilityRegistry::new();
        assert!(matches!(
            registry.register(WorkerDescriptor::new("", "http://localhost:1/")),
            Err(MaestroError::Config(_))
        ));
        assert!(matches!(
            registry.register(WorkerDescriptor::new("x", "not a url")),
            Err(MaestroError::Config(_))
        ));
        assert!(matches!(
            registry.register(WorkerDescriptor::new("x", "ftp://host/")),
            Err(MaestroError::Config(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_names_sorted() {
        let names: Vec<_> = default_registry().list_names().into_iter().collect();
        assert_eq!(names, vec!["greeting", "planner", "sentiment"]);
    }

    #[test]
    fn test_endpoint_appends_slash() {
        let d = WorkerDescriptor::new("a", "http://localhost:8001");
        assert_eq!(d.endpoint(), "http://localhost:8001/");
    }

    #[test]
    fn test_from_card() {
        let card = AgentCard {
            name: "Sentiment Agent".into(),
            description: "Classifies sentiment".into(),
            url: "http://localhost:8003/".into(),
            version: "1.0.0".into(),
            default_input_modes: vec!["text".into()],
            default_output_modes: vec!["text".into()],
            skills: vec![AgentSkill {
                id: "sentiment".into(),
                name: "Sentiment".into(),
                description: "positive, negative or neutral".into(),
                tags: vec!["greeting".into(), "conversation".into()],
                examples: vec!["I love this".into()],
            }],
            capabilities: AgentCapabilities {
                streaming: true,
                push_notifications: false,
            },
        };
        let d = WorkerDescriptor::from_card("sentiment", &card);
        assert_eq!(d.name, "sentiment");
        assert_eq!(d.address, "http://localhost:8003/");
        assert!(d.streaming);
        assert_eq!(d.skills[0].id, "sentiment");
        assert_eq!(d.skills[0].tags, vec!["greeting", "conversation"]);
        assert_eq!(d.skills[0].examples, vec!["I love this"]);
    }

    #[test]
    fn test_concurrent_reads() {
        let registry = Arc::new(default_registry());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = registry.clone();
                std::thread::spawn(move || r.resolve("planner").unwrap().name.clone())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), "planner");
        }
    }
}
