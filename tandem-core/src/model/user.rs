use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::error::Error;

/// Opaque per-connection user identifier. Doubles as the last path
/// segment of the signaling endpoint, so it must be URL-path safe.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// `user_<unix-millis>_<6 random chars>`
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
        Self(format!("user_{}_{}", millis, suffix))
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        validate_id("user id", s)?;
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for UserId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn validate_id(kind: &str, s: &str) -> Result<(), Error> {
    if s.is_empty() {
        return Err(Error::InvalidId(format!("{} must not be empty", kind)));
    }
    if let Some(c) = s
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#'))
    {
        return Err(Error::InvalidId(format!(
            "{} '{}' contains forbidden character {:?}",
            kind, s, c
        )));
    }
    Ok(())
}
