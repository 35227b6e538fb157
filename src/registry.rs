use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use crate::bot::Bot;
use crate::dedup;
use crate::delivery::Transport;

/// Name-keyed set of bots sharing one HTTP transport.
///
/// Created once by the process entry point and passed to whatever needs to
/// look bots up.
pub struct BotRegistry {
    bots: Mutex<HashMap<String, Arc<Bot>>>,
    transport: Arc<dyn Transport>,
    dedup_capacity: usize,
}

impl BotRegistry {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            bots: Mutex::new(HashMap::new()),
            transport,
            dedup_capacity: dedup::DEFAULT_CAPACITY,
        }
    }

    /// How many recent message ids each bot created from now on remembers.
    /// Zero turns de-duplication off.
    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.dedup_capacity = capacity;
        self
    }

    /// Return the bot called `name`, creating it on first use. Every call with
    /// the same name yields the same instance.
    pub fn get_or_create(&self, name: &str) -> Arc<Bot> {
        let mut bots = self.bots.lock().unwrap_or_else(PoisonError::into_inner);
        let bot = bots.entry(name.to_string()).or_insert_with(|| {
            info!("Creating bot '{}'", name);
            Arc::new(Bot::new(
                name,
                Arc::clone(&self.transport),
                self.dedup_capacity,
            ))
        });
        Arc::clone(bot)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Bot>> {
        self.bots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .bots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
