use derive_more::Display;
use serde::{Deserialize, Serialize};

pub mod category;
pub mod product;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    #[display("Été")]
    Summer,
    #[display("Hiver")]
    Winter,
    #[display("Toutes saisons")]
    AllSeason,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summer => "summer",
            Self::Winter => "winter",
            Self::AllSeason => "all_season",
        }
    }
}

impl std::str::FromStr for Season {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summer" => Ok(Self::Summer),
            "winter" => Ok(Self::Winter),
            "all_season" => Ok(Self::AllSeason),
            other => Err(anyhow::anyhow!("Unknown season: {other}")),
        }
    }
}
