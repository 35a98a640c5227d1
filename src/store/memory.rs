//! Process-local collaborator store for development and tests

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};

use crate::game::{FinalResult, GameVariant, MatchId};

use super::matches::MatchStatus;
use super::{LevelProgress, Leveling, MatchStore, NewMatch, SocialGraph, StoreError, SupabaseError};

#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub player1: String,
    pub player2: String,
    pub game_type: GameVariant,
    pub status: MatchStatus,
    pub winner: Option<String>,
    pub score_player1: u32,
    pub score_player2: u32,
    pub forfeit: bool,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct MemoryStore {
    next_id: AtomicI64,
    matches: DashMap<MatchId, MatchRecord>,
    profiles: DashMap<String, LevelProgress>,
    /// Unordered pairs, stored with the smaller name first
    friendships: DashSet<(String, String)>,
    offline: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            matches: DashMap::new(),
            profiles: DashMap::new(),
            friendships: DashSet::new(),
            offline: AtomicBool::new(false),
        }
    }

    pub fn add_friendship(&self, a: &str, b: &str) {
        self.friendships.insert(pair(a, b));
    }

    pub fn match_record(&self, id: MatchId) -> Option<MatchRecord> {
        self.matches.get(&id).map(|r| r.value().clone())
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn progress(&self, username: &str) -> LevelProgress {
        self.profiles
            .get(username)
            .map(|p| *p.value())
            .unwrap_or_default()
    }

    /// Make every call fail, to exercise collaborator-failure paths
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Supabase(SupabaseError::Api {
                status: 503,
                body: "store offline".into(),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn create_match(&self, new: NewMatch) -> Result<MatchId, StoreError> {
        self.check_online()?;
        let id = MatchId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.matches.insert(
            id,
            MatchRecord {
                player1: new.player1,
                player2: new.player2,
                game_type: new.game_type,
                status: MatchStatus::Ongoing,
                winner: None,
                score_player1: 0,
                score_player2: 0,
                forfeit: false,
                ended_at: None,
            },
        );
        Ok(id)
    }

    async fn is_completed(&self, id: MatchId) -> Result<bool, StoreError> {
        self.check_online()?;
        Ok(self
            .matches
            .get(&id)
            .map(|r| r.status == MatchStatus::Completed)
            .unwrap_or(false))
    }

    async fn persist_result(&self, result: &FinalResult) -> Result<(), StoreError> {
        self.check_online()?;
        let mut record = self
            .matches
            .get_mut(&result.match_id)
            .ok_or(StoreError::UnknownMatch(result.match_id))?;
        record.status = MatchStatus::Completed;
        record.winner = Some(result.winner.clone());
        record.score_player1 = result.score1;
        record.score_player2 = result.score2;
        record.forfeit = result.forfeited;
        record.ended_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl Leveling for MemoryStore {
    async fn award_experience(&self, username: &str, amount: u32) -> Result<LevelProgress, StoreError> {
        self.check_online()?;
        let mut entry = self.profiles.entry(username.to_string()).or_default();
        entry.add_xp(amount);
        Ok(*entry)
    }
}

#[async_trait]
impl SocialGraph for MemoryStore {
    async fn is_friend(&self, a: &str, b: &str) -> Result<bool, StoreError> {
        self.check_online()?;
        Ok(self.friendships.contains(&pair(a, b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classic_result(match_id: MatchId) -> FinalResult {
        FinalResult {
            match_id,
            variant: GameVariant::ClassicPong,
            winner: "ana".into(),
            score1: 11,
            score2: 3,
            forfeited: false,
        }
    }

    #[tokio::test]
    async fn match_lifecycle() {
        let store = MemoryStore::new();
        let id = store
            .create_match(NewMatch {
                player1: "ana".into(),
                player2: "bo".into(),
                game_type: GameVariant::ClassicPong,
            })
            .await
            .unwrap();
        assert!(!store.is_completed(id).await.unwrap());

        store.persist_result(&classic_result(id)).await.unwrap();
        assert!(store.is_completed(id).await.unwrap());

        let record = store.match_record(id).unwrap();
        assert_eq!(record.winner.as_deref(), Some("ana"));
        assert_eq!(record.score_player1, 11);
        assert!(record.ended_at.is_some());
    }

    #[tokio::test]
    async fn unknown_match_result_is_an_error() {
        let store = MemoryStore::new();
        let err = store.persist_result(&classic_result(MatchId(99))).await;
        assert!(matches!(err, Err(StoreError::UnknownMatch(MatchId(99)))));
    }

    #[tokio::test]
    async fn friendship_is_symmetric() {
        let store = MemoryStore::new();
        store.add_friendship("bo", "ana");
        assert!(store.is_friend("ana", "bo").await.unwrap());
        assert!(!store.is_friend("ana", "eve").await.unwrap());
    }

    #[tokio::test]
    async fn offline_store_fails() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(store.is_friend("ana", "bo").await.is_err());
        assert!(store.award_experience("ana", 50).await.is_err());
    }
}
