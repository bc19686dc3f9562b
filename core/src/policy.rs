//! Named policy management.
//!
//! Recipes often want a variant of a shared default policy (a lock with a
//! tighter deadline, a watcher that retries forever). [`PolicyRegistry`] keeps
//! such variants by name. It is a plain owned value: build it once, then pass
//! it (or an `Arc` of it) to whatever needs it.

use crate::RetryPolicy;

/// In-memory registry for named [`RetryPolicy`] values.
///
/// Lookups are linear over an internal vector; registries typically hold a
/// handful of entries.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    entries: Vec<(String, RetryPolicy)>,
}

impl PolicyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the recipe policy for `name`, usually one derived from a shared
    /// default. An entry already under that name is handed back.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        policy: RetryPolicy,
    ) -> Option<RetryPolicy> {
        let name = name.into();
        if let Some((_, existing)) = self
            .entries
            .iter_mut()
            .find(|(existing_name, _)| *existing_name == name)
        {
            Some(std::mem::replace(existing, policy))
        } else {
            self.entries.push((name, policy));
            None
        }
    }

    /// Retrieve a policy by name.
    pub fn get(&self, name: &str) -> Option<&RetryPolicy> {
        self.entries
            .iter()
            .find(|(existing_name, _)| existing_name == name)
            .map(|(_, policy)| policy)
    }

    /// Retrieve a policy by name, or `fallback` when it is not registered.
    pub fn get_or<'a>(&'a self, name: &str, fallback: &'a RetryPolicy) -> &'a RetryPolicy {
        self.get(name).unwrap_or(fallback)
    }

    /// Drop the recipe policy for `name` and hand it back, if there was one.
    pub fn remove(&mut self, name: &str) -> Option<RetryPolicy> {
        let index = self
            .entries
            .iter()
            .position(|(existing_name, _)| existing_name == name)?;
        Some(self.entries.swap_remove(index).1)
    }

    /// Names of all registered policies, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of registered policies.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear the registry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
