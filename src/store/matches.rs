//! Match records in the `matches` table

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::{FinalResult, GameVariant, MatchId};

use super::supabase::SupabaseClient;
use super::{MatchStore, NewMatch, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Ongoing,
    Completed,
}

#[derive(Debug, Serialize)]
struct MatchInsert<'a> {
    player1: &'a str,
    player2: &'a str,
    game_type: GameVariant,
    status: MatchStatus,
}

#[derive(Debug, Deserialize)]
struct MatchRow {
    id: MatchId,
    status: MatchStatus,
}

#[derive(Debug, Serialize)]
struct MatchCompletion<'a> {
    status: MatchStatus,
    winner: &'a str,
    score_player1: u32,
    score_player2: u32,
    forfeit: bool,
    ended_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SupabaseMatchStore {
    client: SupabaseClient,
}

impl SupabaseMatchStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MatchStore for SupabaseMatchStore {
    async fn create_match(&self, new: NewMatch) -> Result<MatchId, StoreError> {
        let row: MatchRow = self
            .client
            .insert(
                "matches",
                &MatchInsert {
                    player1: &new.player1,
                    player2: &new.player2,
                    game_type: new.game_type,
                    status: MatchStatus::Ongoing,
                },
            )
            .await?;
        Ok(row.id)
    }

    async fn is_completed(&self, id: MatchId) -> Result<bool, StoreError> {
        let query = format!("id=eq.{}&select=id,status", id);
        let row: Option<MatchRow> = self.client.select_one("matches", &query).await?;
        Ok(matches!(row, Some(r) if r.status == MatchStatus::Completed))
    }

    async fn persist_result(&self, result: &FinalResult) -> Result<(), StoreError> {
        let query = format!("id=eq.{}", result.match_id);
        let completion = MatchCompletion {
            status: MatchStatus::Completed,
            winner: &result.winner,
            score_player1: result.score1,
            score_player2: result.score2,
            forfeit: result.forfeited,
            ended_at: Utc::now(),
        };
        self.client.update("matches", &query, &completion).await?;
        Ok(())
    }
}
