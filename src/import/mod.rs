pub mod controllers;
pub mod images;
pub mod job;
pub mod parser;
pub mod sheet;
pub mod slug;

/// Heuristics driving one import batch. The supplier price lists currently
/// carry a single manufacturer, so the defaults describe the Continental
/// sheets; a different supplier only needs a different `ImportRules` value,
/// not a code change.
#[derive(Debug, Clone)]
pub struct ImportRules {
    pub brand: String,
    /// Tokens removed verbatim from titles before the model name is derived.
    /// Matching is case-sensitive, the way the tokens appear in source data.
    pub noise_tokens: Vec<String>,
    /// Model name used when nothing survives the cleanup.
    pub placeholder_name: String,
    /// Lowercase keyword sets; winter is checked before summer.
    pub winter_keywords: Vec<String>,
    pub summer_keywords: Vec<String>,
    pub title_column: String,
    pub price_column: String,
    pub description_column: String,
    pub category_name: String,
    pub category_slug: String,
    pub category_description: String,
    /// Seed stock for brand-new entries. Never applied on re-import.
    pub default_stock: u32,
}

impl Default for ImportRules {
    fn default() -> Self {
        Self {
            brand: "Continental".to_string(),
            noise_tokens: vec!["Pneu".to_string(), "CONTINENTAL".to_string()],
            placeholder_name: "Continental Tire".to_string(),
            winter_keywords: ["winter", "hiver", "neige", "snow"]
                .map(str::to_string)
                .to_vec(),
            summer_keywords: ["summer", "été", "sport"].map(str::to_string).to_vec(),
            title_column: "DESIGNATION".to_string(),
            price_column: "PRIX TTC".to_string(),
            description_column: "DESCRIPTION".to_string(),
            category_name: "Continental".to_string(),
            category_slug: "continental".to_string(),
            category_description: "Pneus Continental - Qualité et performance européenne"
                .to_string(),
            default_stock: 10,
        }
    }
}
