//! Hook callback registry
//!
//! Hooks are configured per [`HookEvent`] as a list of [`HookMatcher`]s. When
//! the router initializes, every callback is assigned a stable id of the form
//! `hook_{n}` and the agent receives the matcher patterns with those ids. The
//! agent later fires a hook by sending a `hook_callback` control request naming
//! the id; the registry maps it back to the callback.
//!
//! Ids are assigned by walking events in their declaration order, then each
//! event's matchers in configuration order, then each matcher's callbacks.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::error::Result;
use crate::types::hooks::{HookCallback, HookContext, HookEvent, HookInput, HookMatcher, HookOutput};
use crate::types::identifiers::HookCallbackId;

/// One matcher as announced to the agent
#[derive(Debug, Clone)]
struct RegisteredMatcher {
    matcher: Option<String>,
    callback_ids: Vec<HookCallbackId>,
    timeout: Option<Duration>,
}

/// Registry of hook callbacks keyed by their assigned ids
#[derive(Clone, Default)]
pub struct HookRegistry {
    callbacks: HashMap<HookCallbackId, HookCallback>,
    matchers: BTreeMap<HookEvent, Vec<RegisteredMatcher>>,
}

impl HookRegistry {
    /// Assign ids to every configured callback
    #[must_use]
    pub fn build(config: &HashMap<HookEvent, Vec<HookMatcher>>) -> Self {
        let ordered: BTreeMap<HookEvent, &Vec<HookMatcher>> =
            config.iter().map(|(event, matchers)| (*event, matchers)).collect();

        let mut registry = Self::default();
        let mut next_index = 0usize;
        for (event, matchers) in ordered {
            let registered = matchers
                .iter()
                .map(|matcher| {
                    let callback_ids = matcher
                        .hooks
                        .iter()
                        .map(|callback| {
                            let id = HookCallbackId::from_index(next_index);
                            next_index += 1;
                            registry.callbacks.insert(id.clone(), Arc::clone(callback));
                            id
                        })
                        .collect();
                    RegisteredMatcher {
                        matcher: matcher.matcher.clone(),
                        callback_ids,
                        timeout: matcher.timeout,
                    }
                })
                .collect();
            registry.matchers.insert(event, registered);
        }

        debug!(
            "registered {} hook callbacks across {} events",
            registry.callbacks.len(),
            registry.matchers.len()
        );
        registry
    }

    /// Callback registered under `id`
    #[must_use]
    pub fn get(&self, id: &HookCallbackId) -> Option<&HookCallback> {
        self.callbacks.get(id)
    }

    /// Number of registered callbacks
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Whether no callbacks are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Hook section of the `initialize` request, `None` when no hooks exist
    ///
    /// ```rust
    /// use std::collections::HashMap;
    /// use kodegen_agent_protocol::hooks::{HookMatcherBuilder, HookRegistry};
    /// use kodegen_agent_protocol::types::{HookEvent, HookOutput};
    ///
    /// let matcher = HookMatcherBuilder::new(Some("Bash"))
    ///     .add_hook(HookRegistry::callback(|_, _, _| async { Ok(HookOutput::proceed()) }))
    ///     .build();
    /// let registry = HookRegistry::build(&HashMap::from([(HookEvent::PreToolUse, vec![matcher])]));
    ///
    /// let config = registry.initialize_config().expect("one hook registered");
    /// assert_eq!(config["PreToolUse"][0]["matcher"], "Bash");
    /// assert_eq!(config["PreToolUse"][0]["hookCallbackIds"][0], "hook_0");
    /// ```
    #[must_use]
    pub fn initialize_config(&self) -> Option<serde_json::Value> {
        if self.matchers.is_empty() {
            return None;
        }

        let mut config = serde_json::Map::new();
        for (event, matchers) in &self.matchers {
            let entries: Vec<serde_json::Value> = matchers
                .iter()
                .map(|m| {
                    let mut entry = serde_json::json!({
                        "matcher": m.matcher,
                        "hookCallbackIds": m.callback_ids,
                    });
                    if let Some(timeout) = m.timeout {
                        entry["timeout"] = serde_json::json!(timeout.as_secs_f64());
                    }
                    entry
                })
                .collect();
            config.insert(event.as_str().to_string(), serde_json::Value::Array(entries));
        }
        Some(serde_json::Value::Object(config))
    }

    /// Ids whose matcher accepts `tool_name` for `event`
    #[must_use]
    pub fn matching_ids(&self, event: HookEvent, tool_name: Option<&str>) -> Vec<&HookCallbackId> {
        self.matchers
            .get(&event)
            .into_iter()
            .flatten()
            .filter(|m| Self::matches(m.matcher.as_deref(), tool_name))
            .flat_map(|m| m.callback_ids.iter())
            .collect()
    }

    /// Check if a matcher pattern accepts a tool name
    ///
    /// No pattern and `*` accept everything; otherwise the pattern is a
    /// `|`-separated list of exact names.
    ///
    /// ```
    /// use kodegen_agent_protocol::hooks::HookRegistry;
    ///
    /// assert!(HookRegistry::matches(None, Some("Bash")));
    /// assert!(HookRegistry::matches(Some("*"), Some("Read")));
    /// assert!(HookRegistry::matches(Some("Read|Write"), Some("Write")));
    /// assert!(!HookRegistry::matches(Some("Bash"), None));
    /// ```
    #[must_use]
    pub fn matches(pattern: Option<&str>, tool_name: Option<&str>) -> bool {
        match (pattern, tool_name) {
            (None, _) | (Some("*"), _) => true,
            (Some(pattern), Some(name)) => pattern.split('|').any(|p| p == name),
            (Some(_), None) => false,
        }
    }

    /// Create a hook callback from a closure
    pub fn callback<F, Fut>(f: F) -> HookCallback
    where
        F: Fn(HookInput, Option<String>, HookContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<HookOutput>> + Send + 'static,
    {
        Arc::new(move |input, tool_use_id, context| Box::pin(f(input, tool_use_id, context)))
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("callbacks", &self.callbacks.len())
            .field("matchers", &self.matchers)
            .finish()
    }
}

/// Builder for creating hook matchers
pub struct HookMatcherBuilder {
    matcher: Option<String>,
    hooks: Vec<HookCallback>,
    timeout: Option<Duration>,
}

impl HookMatcherBuilder {
    /// Create a builder; `None` matches every tool
    pub fn new(pattern: Option<impl Into<String>>) -> Self {
        Self {
            matcher: pattern.map(Into::into),
            hooks: Vec::new(),
            timeout: None,
        }
    }

    /// Add a hook callback
    #[must_use]
    pub fn add_hook(mut self, hook: HookCallback) -> Self {
        self.hooks.push(hook);
        self
    }

    /// How long the agent waits for these callbacks
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the hook matcher
    #[must_use]
    pub fn build(self) -> HookMatcher {
        HookMatcher {
            matcher: self.matcher,
            hooks: self.hooks,
            timeout: self.timeout,
        }
    }
}
