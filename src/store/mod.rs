//! Collaborator interfaces for match records, leveling and friendships,
//! with in-memory and Supabase implementations

pub mod leveling;
pub mod matches;
pub mod memory;
pub mod profiles;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::game::{FinalResult, GameVariant, MatchId};

pub use leveling::LevelProgress;
pub use matches::SupabaseMatchStore;
pub use memory::MemoryStore;
pub use profiles::{ProfileStore, RelationshipStore};
pub use supabase::{SupabaseClient, SupabaseError};

/// Pairing to be recorded as a new ongoing match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMatch {
    pub player1: String,
    pub player2: String,
    pub game_type: GameVariant,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Supabase(#[from] SupabaseError),

    #[error("unknown match {0}")]
    UnknownMatch(MatchId),

    #[error("unknown user {0:?}")]
    UnknownUser(String),
}

/// Durable match records
#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn create_match(&self, new: NewMatch) -> Result<MatchId, StoreError>;

    /// True once a final result has been persisted for `id`
    async fn is_completed(&self, id: MatchId) -> Result<bool, StoreError>;

    async fn persist_result(&self, result: &FinalResult) -> Result<(), StoreError>;
}

/// Player experience ledger
#[async_trait]
pub trait Leveling: Send + Sync {
    async fn award_experience(&self, username: &str, amount: u32)
        -> Result<LevelProgress, StoreError>;
}

/// Friendship lookups
#[async_trait]
pub trait SocialGraph: Send + Sync {
    async fn is_friend(&self, a: &str, b: &str) -> Result<bool, StoreError>;
}

/// The three collaborators, shared by every service that needs them
#[derive(Clone)]
pub struct Collaborators {
    pub matches: Arc<dyn MatchStore>,
    pub leveling: Arc<dyn Leveling>,
    pub social: Arc<dyn SocialGraph>,
}

impl Collaborators {
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            matches: store.clone(),
            leveling: store.clone(),
            social: store,
        }
    }

    /// Supabase when configured, otherwise a process-local store
    pub fn from_config(config: &Config) -> Self {
        match &config.supabase {
            Some(supabase) => {
                let client = SupabaseClient::new(supabase);
                Self {
                    matches: Arc::new(SupabaseMatchStore::new(client.clone())),
                    leveling: Arc::new(ProfileStore::new(client.clone())),
                    social: Arc::new(RelationshipStore::new(client)),
                }
            }
            None => {
                let store = MemoryStore::new();
                for (a, b) in &config.dev_friendships {
                    store.add_friendship(a, b);
                }
                if !config.dev_friendships.is_empty() {
                    tracing::info!(
                        pairs = config.dev_friendships.len(),
                        "Seeded in-memory friendships"
                    );
                }
                Self::in_memory(Arc::new(store))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_is_seeded_with_configured_friends() {
        let config = Config {
            dev_friendships: vec![("ana".into(), "bo".into())],
            ..Config::for_tests()
        };
        let collaborators = Collaborators::from_config(&config);

        assert!(collaborators.social.is_friend("ana", "bo").await.unwrap());
        assert!(collaborators.social.is_friend("bo", "ana").await.unwrap());
        assert!(!collaborators.social.is_friend("ana", "cy").await.unwrap());
    }
}
