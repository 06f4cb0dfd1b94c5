use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A login endpoint of the record store. Deployments differ in which account
/// kind the agent is registered as, so several are tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    Superuser,
    Admin,
    User,
}

impl AuthStrategy {
    pub fn path(&self) -> &'static str {
        match self {
            AuthStrategy::Superuser => "/api/collections/_superusers/auth-with-password",
            AuthStrategy::Admin => "/api/admins/auth-with-password",
            AuthStrategy::User => "/api/collections/users/auth-with-password",
        }
    }

    pub fn parse_list(names: &str) -> Result<Vec<Self>, String> {
        names
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for AuthStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "superuser" => Ok(AuthStrategy::Superuser),
            "admin" => Ok(AuthStrategy::Admin),
            "user" => Ok(AuthStrategy::User),
            other => Err(format!("unknown auth strategy: {}", other)),
        }
    }
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthStrategy::Superuser => "superuser",
            AuthStrategy::Admin => "admin",
            AuthStrategy::User => "user",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Default, Serialize)]
pub struct Credentials {
    pub identity: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub token: String,
}
