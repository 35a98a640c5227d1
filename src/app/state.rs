//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{InGamePlayers, MatchDeps, MatchRegistry};
use crate::invite::InviteRouter;
use crate::matchmaking::MatchmakingService;
use crate::store::Collaborators;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub presence: Arc<InGamePlayers>,
    pub matchmaking: Arc<MatchmakingService>,
    pub invites: Arc<InviteRouter>,
    pub match_registry: Arc<MatchRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let collaborators = Collaborators::from_config(&config);
        Self::with_collaborators(config, collaborators)
    }

    pub fn with_collaborators(config: Config, collaborators: Collaborators) -> Self {
        let config = Arc::new(config);
        let presence = Arc::new(InGamePlayers::new());

        let match_registry = Arc::new(MatchRegistry::new(MatchDeps {
            collaborators: collaborators.clone(),
            presence: presence.clone(),
            lifecycle: config.lifecycle,
        }));

        let matchmaking = Arc::new(MatchmakingService::new(
            presence.clone(),
            collaborators.matches.clone(),
        ));
        let invites = Arc::new(InviteRouter::new(presence.clone(), collaborators));

        Self {
            config,
            presence,
            matchmaking,
            invites,
            match_registry,
        }
    }
}
