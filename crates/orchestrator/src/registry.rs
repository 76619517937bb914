use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::parser::ArgValue;

pub type ArgMap = HashMap<String, ArgValue>;

type HandlerFuture = Pin<Box<dyn Future<Output = String> + Send>>;
type Handler = Arc<dyn Fn(ArgMap) -> HandlerFuture + Send + Sync>;

/// One invokable action: name, description, JSON-Schema parameter object
/// and the handler closure. Handlers never fail — errors come back as
/// `❌ …` strings.
pub struct CapabilityDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
    handler: Handler,
}

impl CapabilityDescriptor {
    pub fn new<F, Fut>(
        name: &'static str,
        description: &'static str,
        parameters: serde_json::Value,
        handler: F,
    ) -> Self
    where
        F: Fn(ArgMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        Self {
            name,
            description,
            parameters,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

/// The closed set of capabilities the master brain may dispatch. Built
/// once at startup and read-only afterwards.
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: Vec<CapabilityDescriptor>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: CapabilityDescriptor) {
        debug_assert!(
            !self.capabilities.iter().any(|c| c.name == descriptor.name),
            "duplicate capability {}",
            descriptor.name
        );
        self.capabilities.push(descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityDescriptor> {
        self.capabilities.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.capabilities.iter().map(|c| c.name).collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// `- name: description` lines for the master-brain system prompt.
    pub fn catalogue(&self) -> String {
        self.capabilities
            .iter()
            .map(|c| format!("- {}: {}", c.name, c.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Dispatch a parsed call. None means the name is outside the closed
    /// set.
    pub async fn invoke(&self, name: &str, args: ArgMap) -> Option<String> {
        let descriptor = self.get(name)?;
        tracing::info!(capability = name, "dispatching capability");
        Some((descriptor.handler)(args).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_registry() -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        registry.register(CapabilityDescriptor::new(
            "echo",
            "echo the message argument",
            json!({"type": "object", "properties": {"message": {"type": "string"}}}),
            |args: ArgMap| async move {
                args.get("message")
                    .and_then(ArgValue::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| "❌ 缺少message参数".to_string())
            },
        ));
        registry
    }

    #[tokio::test]
    async fn invoke_dispatches_to_handler() {
        let registry = echo_registry();
        let mut args = ArgMap::new();
        args.insert("message".to_string(), ArgValue::Str("hi".to_string()));

        assert_eq!(registry.invoke("echo", args).await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn unknown_name_is_none() {
        let registry = echo_registry();
        assert!(registry.invoke("missing", ArgMap::new()).await.is_none());
    }

    #[test]
    fn catalogue_lists_names_and_descriptions() {
        let registry = echo_registry();
        assert_eq!(registry.catalogue(), "- echo: echo the message argument");
    }
}
