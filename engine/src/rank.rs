use std::collections::HashSet;

use shared::{login_key, ContributorProfile};

const BOT_SUFFIX: &str = "[bot]";

/// Drops automated accounts: exact block-list hits and anything ending in `[bot]`,
/// both case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct BotFilter {
    blocked: HashSet<String>,
}

impl BotFilter {
    pub fn new<S: AsRef<str>>(logins: &[S]) -> Self {
        Self {
            blocked: logins.iter().map(|login| login_key(login.as_ref())).collect(),
        }
    }

    pub fn is_bot(&self, login: &str) -> bool {
        let key = login_key(login.trim());
        key.ends_with(BOT_SUFFIX) || self.blocked.contains(&key)
    }

    pub fn retain_humans(&self, profiles: Vec<ContributorProfile>) -> Vec<ContributorProfile> {
        profiles
            .into_iter()
            .filter(|profile| {
                let bot = self.is_bot(&profile.login);
                if bot {
                    tracing::debug!("Skipping bot account {}", profile.login);
                }
                !bot
            })
            .collect()
    }
}

/// Highest score first, login ascending on ties.
pub fn rank(mut profiles: Vec<ContributorProfile>) -> Vec<ContributorProfile> {
    profiles.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| login_key(&a.login).cmp(&login_key(&b.login)))
            .then_with(|| a.login.cmp(&b.login))
    });
    profiles
}
