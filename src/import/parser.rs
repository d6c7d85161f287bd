use crate::import::ImportRules;
use lazy_regex::regex;
use pneu_types::product::display_name;
use pneu_types::Season;

/// Sentinel for titles carrying no recognizable tire size.
pub const UNKNOWN_SIZE: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTire {
    pub brand: String,
    pub size: String,
    pub model_name: String,
}

impl ParsedTire {
    pub fn display_name(&self) -> String {
        display_name(&self.brand, &self.model_name, &self.size)
    }
}

/// Derives structured tire attributes from a free-text listing title.
///
/// Total over any input: an unparseable title falls back to the Unknown size
/// and the placeholder model name instead of failing.
pub fn parse_tire_title(rules: &ImportRules, title: &str) -> ParsedTire {
    let size_match = regex!(r"(?i)\d{3}/\d{2}\s?R?\s?\d{2}").find(title);
    let size = match size_match {
        Some(m) => normalize_size(m.as_str()),
        None => UNKNOWN_SIZE.to_string(),
    };

    let mut name = title.to_string();
    for token in &rules.noise_tokens {
        name = name.replace(token, "");
    }
    if let Some(m) = size_match {
        name = name.replace(m.as_str(), "");
    }
    let name = regex!(r"\b\d{2,3}[A-Z]{1,2}\b").replace_all(&name, "");
    let name = regex!(r"\s+").replace_all(name.trim(), " ");
    let name = regex!(r"^[^a-zA-Z0-9]+|[^a-zA-Z0-9]+$").replace_all(&name, "");
    let model_name = if name.is_empty() {
        rules.placeholder_name.clone()
    } else {
        name.to_string()
    };

    ParsedTire {
        brand: rules.brand.clone(),
        size,
        model_name,
    }
}

/// `"195/65 r 15"` -> `"195/65R15"`.
fn normalize_size(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .replace('r', "R")
}

/// Keyword heuristic over title + description. Winter keywords take
/// precedence over summer ones; anything else is an all-season tire.
pub fn classify_season(rules: &ImportRules, title: &str, description: &str) -> Season {
    let text = format!("{title} {description}").to_lowercase();
    if rules.winter_keywords.iter().any(|w| text.contains(w.as_str())) {
        return Season::Winter;
    }
    if rules.summer_keywords.iter().any(|w| text.contains(w.as_str())) {
        return Season::Summer;
    }
    Season::AllSeason
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn rules() -> ImportRules {
        ImportRules::default()
    }

    #[test]
    fn parses_size_and_model() {
        let parsed = parse_tire_title(&rules(), "Pneu CONTINENTAL 195/65r15 91H ULTRA CONTACT");
        assert_eq!("195/65R15", parsed.size);
        assert_eq!("ULTRA CONTACT", parsed.model_name);
        assert_eq!("Continental", parsed.brand);
        assert_eq!(
            "Continental ULTRA CONTACT 195/65R15",
            parsed.display_name()
        );
    }

    #[test]
    fn normalizes_spaced_sizes() {
        let parsed = parse_tire_title(&rules(), "Pneu CONTINENTAL 205/55 R 16 PremiumContact 6");
        assert_eq!("205/55R16", parsed.size);
        assert_eq!("PremiumContact 6", parsed.model_name);
    }

    #[test]
    fn strips_load_and_speed_index() {
        let parsed = parse_tire_title(&rules(), "Pneu CONTINENTAL 225/45R17 94W SportContact 7");
        assert_eq!("225/45R17", parsed.size);
        assert_eq!("SportContact 7", parsed.model_name);
    }

    #[test]
    fn falls_back_when_size_is_missing() {
        let parsed = parse_tire_title(&rules(), "Pneu CONTINENTAL EcoContact");
        assert_eq!(UNKNOWN_SIZE, parsed.size);
        assert_eq!("EcoContact", parsed.model_name);
    }

    #[test]
    fn is_total_over_degenerate_titles() {
        let parsed = parse_tire_title(&rules(), "");
        assert_eq!(UNKNOWN_SIZE, parsed.size);
        assert_eq!("Continental Tire", parsed.model_name);

        let parsed = parse_tire_title(&rules(), "   Pneu CONTINENTAL   ");
        assert_eq!("Continental Tire", parsed.model_name);
    }

    #[test]
    fn trims_leading_and_trailing_punctuation() {
        let parsed = parse_tire_title(&rules(), "Pneu CONTINENTAL - 195/65R15 - AllSeasonContact -");
        assert_eq!("AllSeasonContact", parsed.model_name);
    }

    #[test]
    fn classifies_seasons() {
        let rules = rules();
        assert_eq!(Season::Winter, classify_season(&rules, "Pneu Hiver Neige", ""));
        assert_eq!(Season::Summer, classify_season(&rules, "Pneu Sport Été", ""));
        assert_eq!(Season::AllSeason, classify_season(&rules, "Pneu Standard", ""));
        assert_eq!(
            Season::Winter,
            classify_season(&rules, "WinterContact", "parfait pour l'été")
        );
        assert_eq!(
            Season::Summer,
            classify_season(&rules, "EcoContact", "idéal en été")
        );
    }
}
