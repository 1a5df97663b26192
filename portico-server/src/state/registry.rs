use crate::config::Config;
use crate::db::repo::account::AccountRepo;
use crate::services::{
    AccountService, Argon2Verifier, FsAvatarUploader, MemorySessions, RuleValidator, SessionIssuer,
};
use std::sync::Arc;

/// Shared, process-wide state handed to every request.
pub struct Registry {
    pub config: Arc<Config>,
    pub services: Services,
}

pub struct Services {
    pub account: Arc<AccountService>,
    pub sessions: Arc<dyn SessionIssuer>,
}

impl Registry {
    /// Wires the production collaborators around the given account store.
    pub fn new(config: Config, accounts: Arc<dyn AccountRepo>) -> Self {
        let sessions: Arc<dyn SessionIssuer> = Arc::new(MemorySessions::new(config.token_ttl_secs));

        let account = Arc::new(AccountService::new(
            Arc::new(RuleValidator::new(accounts.clone())),
            accounts,
            Arc::new(FsAvatarUploader::new(&config.photo_dir, config.max_photo_bytes)),
            sessions.clone(),
            Arc::new(Argon2Verifier::new()),
            config.app_url.clone(),
        ));

        Self {
            config: Arc::new(config),
            services: Services { account, sessions },
        }
    }
}
