use crate::category::Category;
use crate::Season;
use async_trait::async_trait;
use lazy_regex::regex;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use typesafe_repository::async_ops::{Get, List, Save};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;

/// The (name, brand, size) triple identifying a catalog entry independent of
/// its generated slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub name: String,
    pub brand: String,
    pub size: String,
}

/// Fields an import run is allowed to touch on an existing entry. Stock and
/// the active flag belong to inventory operations and are absent on purpose.
#[derive(Debug, Clone)]
pub struct ImportFields {
    pub description: String,
    pub price: Decimal,
    pub season: Season,
    pub image: Option<String>,
}

#[derive(Id, Clone, Debug)]
#[Id(get_id, ref_id)]
pub struct CatalogProduct {
    #[id]
    pub slug: String,
    pub name: String,
    pub brand: String,
    pub size: String,
    pub description: String,
    pub price: Decimal,
    pub season: Season,
    pub category: Option<IdentityOf<Category>>,
    pub image: Option<String>,
    pub stock: u32,
    pub active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl CatalogProduct {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            name: self.name.clone(),
            brand: self.brand.clone(),
            size: self.size.clone(),
        }
    }

    pub fn display_name(&self) -> String {
        display_name(&self.brand, &self.name, &self.size)
    }
}

pub fn display_name(brand: &str, name: &str, size: &str) -> String {
    let regex = regex!(r"\s+");
    regex
        .replace_all(format!("{brand} {name} {size}").trim(), " ")
        .to_string()
}

#[async_trait]
pub trait SlugLookup: Send + Sync {
    async fn slug_exists(&self, slug: &str) -> Result<bool, anyhow::Error>;
}

#[async_trait]
pub trait ProductRepository:
    Repository<CatalogProduct, Error = anyhow::Error>
    + Save<CatalogProduct>
    + Get<CatalogProduct>
    + List<CatalogProduct>
    + SlugLookup
    + Send
    + Sync
{
    async fn find_by_key(&self, key: &NaturalKey) -> Result<Option<CatalogProduct>, Self::Error>;

    /// Applies the import-owned fields to the entry with the given natural
    /// key as one statement. The image is only overwritten when a new one is
    /// present.
    async fn update_import_fields(
        &self,
        key: &NaturalKey,
        fields: ImportFields,
    ) -> Result<(), Self::Error>;

    async fn count(&self) -> Result<usize, Self::Error>;
}
