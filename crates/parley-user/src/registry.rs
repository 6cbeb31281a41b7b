//! The user registry: every connected client's `ChatUser`.
//!
//! Like a session table, the registry is a plain map with no locking of
//! its own. [`UserComponent`](crate::UserComponent) wraps it in a mutex,
//! which is also what serializes username claims.

use std::collections::HashMap;
use std::sync::Arc;

use parley_transport::ClientId;

use crate::ChatUser;

#[derive(Debug, Default)]
pub struct UserRegistry {
    users: HashMap<ClientId, Arc<ChatUser>>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user, replacing any previous record for the same client.
    pub fn insert(&mut self, user: Arc<ChatUser>) {
        self.users.insert(user.client_id(), user);
    }

    pub fn remove(&mut self, client_id: ClientId) -> Option<Arc<ChatUser>> {
        self.users.remove(&client_id)
    }

    pub fn get(&self, client_id: ClientId) -> Option<Arc<ChatUser>> {
        self.users.get(&client_id).cloned()
    }

    /// `true` if an identified user other than `except` already holds
    /// `name`, compared case-insensitively.
    pub fn is_name_taken(&self, name: &str, except: ClientId) -> bool {
        let wanted = name.to_lowercase();
        self.users.values().any(|user| {
            user.client_id() != except
                && user.is_identified()
                && user.username().to_lowercase() == wanted
        })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u64, name: &str) -> Arc<ChatUser> {
        Arc::new(ChatUser::new(ClientId::new(id), name, "127.0.0.1"))
    }

    #[test]
    fn test_insert_get_remove() {
        let mut registry = UserRegistry::new();
        registry.insert(user(1, "guest-1"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(ClientId::new(1)).unwrap().username(), "guest-1");

        assert!(registry.remove(ClientId::new(1)).is_some());
        assert!(registry.get(ClientId::new(1)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_only_identified_names_are_taken() {
        let mut registry = UserRegistry::new();
        let alice = user(1, "guest-1");
        registry.insert(Arc::clone(&alice));

        assert!(!registry.is_name_taken("guest-1", ClientId::new(2)));

        alice.identify("Alice".into());
        assert!(registry.is_name_taken("alice", ClientId::new(2)));
        assert!(registry.is_name_taken("ALICE", ClientId::new(2)));
        // Re-claiming your own name is not a conflict.
        assert!(!registry.is_name_taken("alice", ClientId::new(1)));
    }
}
