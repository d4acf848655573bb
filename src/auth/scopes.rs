use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Named Gmail permission level. The levels nest: readonly < modify < full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Readonly,
    Modify,
    Full,
}

/// Sending mail, creating drafts, and replying all need at least modify.
pub const DEFAULT_SCOPE: Scope = Scope::Modify;

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::Readonly, Scope::Modify, Scope::Full];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Readonly => "readonly",
            Scope::Modify => "modify",
            Scope::Full => "full",
        }
    }

    /// Gmail API permission URLs requested for this level.
    pub fn permission_urls(&self) -> &'static [&'static str] {
        match self {
            Scope::Readonly => &["https://www.googleapis.com/auth/gmail.readonly"],
            Scope::Modify => &[
                "https://www.googleapis.com/auth/gmail.readonly",
                "https://www.googleapis.com/auth/gmail.modify",
            ],
            Scope::Full => &["https://mail.google.com/"],
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "readonly" => Ok(Scope::Readonly),
            "modify" => Ok(Scope::Modify),
            "full" => Ok(Scope::Full),
            other => Err(Error::InvalidScope(other.to_string())),
        }
    }
}
