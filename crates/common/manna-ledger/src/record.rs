use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum number of units a player may buy in any one category.
pub const UPGRADE_CAP: u8 = 12;

pub const LICENCE_PRICE: u64 = 500;
pub const TALENT_PRICE: u64 = 300;
pub const TRAINING_PRICE: u64 = 200;

/// Manna that must be spent to gain one licence level.
pub const MANNA_PER_LEVEL: u64 = 1000;

/// Identity of a player: the chat platform's user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl PlayerId {
    /// Key bytes used by ordered stores. Big-endian so scans follow numeric order.
    pub fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Renders the id as a platform mention.
    pub fn mention(self) -> String {
        format!("<@{}>", self.0)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PlayerId {
    fn from(raw: u64) -> Self {
        PlayerId(raw)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{0}' is not a user id or mention")]
pub struct ParsePlayerIdError(pub String);

impl FromStr for PlayerId {
    type Err = ParsePlayerIdError;

    /// Accepts a bare id (`123`) or a mention (`<@123>`, `<@!123>`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = match trimmed.strip_prefix("<@").and_then(|rest| rest.strip_suffix('>')) {
            Some(inner) => inner.strip_prefix('!').unwrap_or(inner),
            None => trimmed,
        };
        digits
            .parse::<u64>()
            .map(PlayerId)
            .map_err(|_| ParsePlayerIdError(s.to_string()))
    }
}

/// The three kinds of upgrade a player can buy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Licence,
    Talent,
    Training,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Licence, Category::Talent, Category::Training];

    /// Per-unit price in manna.
    pub fn price(self) -> u64 {
        match self {
            Category::Licence => LICENCE_PRICE,
            Category::Talent => TALENT_PRICE,
            Category::Training => TRAINING_PRICE,
        }
    }

    /// Singular noun with its article, as used in replies ("a licence", "training").
    pub fn with_article(self) -> &'static str {
        match self {
            Category::Licence => "a licence",
            Category::Talent => "a talent",
            Category::Training => "training",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Licence => "licence",
            Category::Talent => "talent",
            Category::Training => "training",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One player's persisted manna and upgrade counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub callsign: String,
    /// Total manna ever awarded. Never decreases.
    pub granted: u64,
    pub licences: u8,
    pub talents: u8,
    pub training: u8,
}

impl PlayerRecord {
    /// A fresh record with no upgrades bought.
    pub fn new(id: PlayerId, callsign: impl Into<String>, granted: u64) -> Self {
        Self {
            id,
            callsign: callsign.into(),
            granted,
            licences: 0,
            talents: 0,
            training: 0,
        }
    }

    /// Builds a record with explicit counts, rejecting counts above the cap
    /// and purchases the grant could not have paid for.
    pub fn with_counts(
        id: PlayerId,
        callsign: impl Into<String>,
        granted: u64,
        licences: u8,
        talents: u8,
        training: u8,
    ) -> Result<Self, LedgerError> {
        let record = Self {
            id,
            callsign: callsign.into(),
            granted,
            licences,
            talents,
            training,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        for category in Category::ALL {
            let count = self.count(category);
            if count > UPGRADE_CAP {
                return Err(LedgerError::InvalidRecord(format!(
                    "{} count {} exceeds the cap of {}",
                    category, count, UPGRADE_CAP
                )));
            }
        }
        if self.spent() > self.granted {
            return Err(LedgerError::InvalidRecord(format!(
                "spent {} exceeds granted {}",
                self.spent(),
                self.granted
            )));
        }
        Ok(())
    }

    pub fn count(&self, category: Category) -> u8 {
        match category {
            Category::Licence => self.licences,
            Category::Talent => self.talents,
            Category::Training => self.training,
        }
    }

    pub(crate) fn count_mut(&mut self, category: Category) -> &mut u8 {
        match category {
            Category::Licence => &mut self.licences,
            Category::Talent => &mut self.talents,
            Category::Training => &mut self.training,
        }
    }

    /// Manna spent on upgrades, derived from the counts.
    pub fn spent(&self) -> u64 {
        Category::ALL
            .iter()
            .map(|c| u64::from(self.count(*c)) * c.price())
            .sum()
    }

    pub fn available(&self) -> u64 {
        self.granted.saturating_sub(self.spent())
    }

    /// Licence level ("ll"): every 1000 manna spent is one level.
    pub fn level(&self) -> u64 {
        self.spent() / MANNA_PER_LEVEL
    }
}

impl fmt::Display for PlayerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ll {}. {}/{} manna. {} licences. {} talents. {} training.",
            self.callsign,
            self.level(),
            self.available(),
            self.granted,
            self.licences,
            self.talents,
            self.training
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_values_follow_price_table() {
        let record = PlayerRecord::with_counts(PlayerId(7), "Hex", 5000, 2, 3, 4).unwrap();
        assert_eq!(record.spent(), 2 * 500 + 3 * 300 + 4 * 200);
        assert_eq!(record.available(), 5000 - 2700);
        assert_eq!(record.level(), 2);
    }

    #[test]
    fn status_line_matches_reply_format() {
        let record = PlayerRecord::with_counts(PlayerId(1), "Nightjar", 1200, 1, 1, 0).unwrap();
        assert_eq!(
            record.to_string(),
            "Nightjar ll 0. 400/1200 manna. 1 licences. 1 talents. 0 training."
        );
    }

    #[test]
    fn with_counts_rejects_values_over_cap() {
        let err = PlayerRecord::with_counts(PlayerId(1), "x", 100_000, 13, 0, 0).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRecord(_)));
    }

    #[test]
    fn with_counts_rejects_overspend() {
        let err = PlayerRecord::with_counts(PlayerId(1), "x", 400, 1, 0, 0).unwrap_err();
        assert!(err.to_string().contains("spent 500 exceeds granted 400"));
    }

    #[test]
    fn player_id_parses_mentions() {
        assert_eq!("42".parse::<PlayerId>(), Ok(PlayerId(42)));
        assert_eq!("<@42>".parse::<PlayerId>(), Ok(PlayerId(42)));
        assert_eq!("<@!42>".parse::<PlayerId>(), Ok(PlayerId(42)));
        assert!("<#42>".parse::<PlayerId>().is_err());
        assert!("bob".parse::<PlayerId>().is_err());
        assert_eq!(PlayerId(42).mention(), "<@42>");
    }
}
