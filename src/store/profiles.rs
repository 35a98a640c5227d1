//! Player profiles (experience ledger) and friendships

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::supabase::SupabaseClient;
use super::{LevelProgress, Leveling, SocialGraph, StoreError};

/// The part of a profile row the match server touches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileLevel {
    pub username: String,
    pub level: u32,
    pub xp: u32,
}

#[derive(Debug, Serialize)]
struct LevelUpdate {
    level: u32,
    xp: u32,
}

/// Profile store operations
#[derive(Clone)]
pub struct ProfileStore {
    client: SupabaseClient,
}

impl ProfileStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub async fn get_level(&self, username: &str) -> Result<Option<ProfileLevel>, StoreError> {
        let query = format!("username=eq.{}&select=username,level,xp", username);
        Ok(self.client.select_one("profiles", &query).await?)
    }
}

#[async_trait]
impl Leveling for ProfileStore {
    async fn award_experience(&self, username: &str, amount: u32) -> Result<LevelProgress, StoreError> {
        let profile = self
            .get_level(username)
            .await?
            .ok_or_else(|| StoreError::UnknownUser(username.to_string()))?;

        let mut progress = LevelProgress {
            level: profile.level.max(1),
            xp: profile.xp,
        };
        progress.add_xp(amount);

        let query = format!("username=eq.{}", username);
        let update = LevelUpdate {
            level: progress.level,
            xp: progress.xp,
        };
        self.client.update("profiles", &query, &update).await?;
        Ok(progress)
    }
}

#[derive(Debug, Deserialize)]
struct RelationshipRow {
    #[serde(rename = "type")]
    kind: String,
}

/// Friendship lookups in `user_relationships`
#[derive(Clone)]
pub struct RelationshipStore {
    client: SupabaseClient,
}

impl RelationshipStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SocialGraph for RelationshipStore {
    async fn is_friend(&self, a: &str, b: &str) -> Result<bool, StoreError> {
        // the pair may be stored in either order
        let query = format!(
            "or=(and(first_user.eq.{a},second_user.eq.{b}),and(first_user.eq.{b},second_user.eq.{a}))&select=type",
            a = a,
            b = b
        );
        let rows: Vec<RelationshipRow> = self.client.select("user_relationships", &query).await?;
        Ok(rows.iter().any(|r| r.kind == "friends"))
    }
}
