use serde::{Deserialize, Serialize};

mod document;
mod error;
mod profile;
mod record;
mod tags;
mod timeperiod;

pub use document::*;
pub use error::*;
pub use profile::*;
pub use record::*;
pub use tags::*;
pub use timeperiod::*;

pub type GithubHandle = String;

/// Logins are case-preserved but compared case-insensitively.
pub fn login_key(login: &str) -> String {
    login.to_lowercase()
}

pub fn same_login(a: &str, b: &str) -> bool {
    login_key(a) == login_key(b)
}
