//! Direct invitations between friends

pub mod router;

pub use router::InviteRouter;

use crate::game::UnknownGameType;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    #[error("Cannot invite yourself")]
    SelfInvite,

    #[error("Inviter is no longer online")]
    InviterOffline,

    #[error("You guys are not friends.")]
    NotFriends,

    #[error("Unknown game type: {0}")]
    UnknownGameType(String),

    #[error("Already in a game")]
    InGame,

    #[error("Failed to create match")]
    Store(#[from] StoreError),
}

impl From<UnknownGameType> for InviteError {
    fn from(e: UnknownGameType) -> Self {
        InviteError::UnknownGameType(e.0)
    }
}
