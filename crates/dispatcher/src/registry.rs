//! ConsumerRegistry - named, ordered set of consumer instances

use std::collections::HashMap;
use std::sync::Arc;

use contracts::Consumer;

/// Name -> consumer mapping, iterated in insertion order
#[derive(Default, Clone)]
pub struct ConsumerRegistry {
    consumers: Vec<Arc<dyn Consumer>>,
    index: HashMap<String, usize>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer under its own name
    ///
    /// A second consumer with the same name replaces the first in place.
    pub fn register(&mut self, consumer: Arc<dyn Consumer>) -> &mut Self {
        let name = consumer.name().to_string();
        match self.index.get(&name) {
            Some(&idx) => self.consumers[idx] = consumer,
            None => {
                self.index.insert(name, self.consumers.len());
                self.consumers.push(consumer);
            }
        }
        self
    }

    /// Builder-style `register`
    pub fn with(mut self, consumer: Arc<dyn Consumer>) -> Self {
        self.register(consumer);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Consumer>> {
        self.index.get(name).map(|&idx| &self.consumers[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.consumers.iter().map(|c| c.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Consumer>> {
        self.consumers.iter()
    }
}

impl std::fmt::Debug for ConsumerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
