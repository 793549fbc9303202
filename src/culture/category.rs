use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A framing theme used to build analogies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CulturalCategory {
    Cricket,
    Bollywood,
    Festivals,
    Food,
    Traffic,
    Family,
}

impl CulturalCategory {
    pub const ALL: [CulturalCategory; 6] = [
        CulturalCategory::Cricket,
        CulturalCategory::Bollywood,
        CulturalCategory::Festivals,
        CulturalCategory::Food,
        CulturalCategory::Traffic,
        CulturalCategory::Family,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Self::Cricket => "cricket",
            Self::Bollywood => "bollywood",
            Self::Festivals => "festivals",
            Self::Food => "food",
            Self::Traffic => "traffic",
            Self::Family => "family",
        }
    }
}

impl fmt::Display for CulturalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for CulturalCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.slug().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown cultural category '{}'", wanted))
    }
}
