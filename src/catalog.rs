use async_trait::async_trait;
use pneu_types::product::{
    CatalogProduct, ImportFields, NaturalKey, ProductRepository, SlugLookup,
};
use pneu_types::Season;
use rusqlite::types::Type;
use rusqlite::{params, Row};
use rust_decimal::Decimal;
use std::str::FromStr;
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::{Get, List, Save};
use typesafe_repository::prelude::*;

const PRODUCT_COLUMNS: &str = "slug, name, brand, size, description, price, season, \
    category, image, stock, active, created_at, updated_at";

pub struct SqliteProductRepository {
    conn: Connection,
}

impl SqliteProductRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            let _ = conn.pragma_update(None, "journal_mode", &"WAL");
            let _ = conn.pragma_update(None, "synchronous", &"NORMAL");
            let _ = conn.pragma_update(None, "busy_timeout", &5000i64);
            conn.execute(
                "CREATE TABLE IF NOT EXISTS catalog_product (
                    slug TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    brand TEXT NOT NULL,
                    size TEXT NOT NULL,
                    description TEXT NOT NULL,
                    price TEXT NOT NULL,
                    season TEXT NOT NULL,
                    category BLOB,
                    image TEXT,
                    stock INTEGER NOT NULL,
                    active INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE(name, brand, size)
                )",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

fn read_product(row: &Row<'_>) -> Result<CatalogProduct, rusqlite::Error> {
    Ok(CatalogProduct {
        slug: row.get(0)?,
        name: row.get(1)?,
        brand: row.get(2)?,
        size: row.get(3)?,
        description: row.get(4)?,
        price: Decimal::from_str_exact(&row.get::<_, String>(5)?).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(err))
        })?,
        season: Season::from_str(&row.get::<_, String>(6)?).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(6, Type::Text, err.into())
        })?,
        category: row.get(7)?,
        image: row.get(8)?,
        stock: row.get(9)?,
        active: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

impl Repository<CatalogProduct> for SqliteProductRepository {
    type Error = anyhow::Error;
}

#[async_trait]
impl Save<CatalogProduct> for SqliteProductRepository {
    // Plain insert: the slug and natural-key uniqueness constraints are the
    // backstop against duplicate creation by concurrent jobs.
    async fn save(&self, p: CatalogProduct) -> Result<(), Self::Error> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO catalog_product ({PRODUCT_COLUMNS})
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                    ),
                    params![
                        p.slug,
                        p.name,
                        p.brand,
                        p.size,
                        p.description,
                        p.price.to_string(),
                        p.season.as_str(),
                        p.category,
                        p.image,
                        p.stock,
                        p.active,
                        p.created_at,
                        p.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Get<CatalogProduct> for SqliteProductRepository {
    async fn get_one(
        &self,
        slug: &IdentityOf<CatalogProduct>,
    ) -> Result<Option<CatalogProduct>, Self::Error> {
        let slug = slug.clone();
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM catalog_product WHERE slug = ?1"
                ))?;
                let p = stmt
                    .query_map([&slug], |row| read_product(row))?
                    .collect::<Result<Vec<_>, _>>();
                Ok(p?.pop())
            })
            .await?)
    }
}

#[async_trait]
impl List<CatalogProduct> for SqliteProductRepository {
    async fn list(&self) -> Result<Vec<CatalogProduct>, Self::Error> {
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM catalog_product ORDER BY slug"
                ))?;
                let p = stmt
                    .query_map([], |row| read_product(row))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(p)
            })
            .await?)
    }
}

#[async_trait]
impl SlugLookup for SqliteProductRepository {
    async fn slug_exists(&self, slug: &str) -> Result<bool, anyhow::Error> {
        let slug = slug.to_string();
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT EXISTS(SELECT 1 FROM catalog_product WHERE slug = ?1)")?;
                let exists = stmt.query_row([&slug], |row| row.get::<_, bool>(0))?;
                Ok(exists)
            })
            .await?)
    }
}

#[async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn find_by_key(&self, key: &NaturalKey) -> Result<Option<CatalogProduct>, Self::Error> {
        let key = key.clone();
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM catalog_product
                    WHERE name = ?1 AND brand = ?2 AND size = ?3"
                ))?;
                let p = stmt
                    .query_map(params![key.name, key.brand, key.size], |row| {
                        read_product(row)
                    })?
                    .collect::<Result<Vec<_>, _>>();
                Ok(p?.pop())
            })
            .await?)
    }

    async fn update_import_fields(
        &self,
        key: &NaturalKey,
        fields: ImportFields,
    ) -> Result<(), Self::Error> {
        let key = key.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE catalog_product
                    SET description = ?1, price = ?2, season = ?3,
                        image = COALESCE(?4, image), updated_at = ?5
                    WHERE name = ?6 AND brand = ?7 AND size = ?8",
                    params![
                        fields.description,
                        fields.price.to_string(),
                        fields.season.as_str(),
                        fields.image,
                        time::OffsetDateTime::now_utc(),
                        key.name,
                        key.brand,
                        key.size,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, Self::Error> {
        let res = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT COUNT(*) FROM catalog_product")?;
                let res = stmt.query_row((), |r| r.get::<_, usize>(0))?;
                Ok(res)
            })
            .await?;
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pneu_types::product::display_name;
    use rust_decimal_macros::dec;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn product(slug: &str, name: &str, size: &str) -> CatalogProduct {
        let now = OffsetDateTime::now_utc();
        CatalogProduct {
            slug: slug.to_string(),
            name: name.to_string(),
            brand: "Continental".to_string(),
            size: size.to_string(),
            description: "desc".to_string(),
            price: dec!(299.238),
            season: Season::AllSeason,
            category: Some(Uuid::new_v4()),
            image: None,
            stock: 10,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn repo() -> SqliteProductRepository {
        let conn = Connection::open_in_memory().await.unwrap();
        SqliteProductRepository::init(conn).await.unwrap()
    }

    #[tokio::test]
    async fn saves_and_finds_by_natural_key() {
        let repo = repo().await;
        let p = product("continental-ultra-contact-195-65r15", "ULTRA CONTACT", "195/65R15");
        let key = p.natural_key();
        repo.save(p).await.unwrap();

        let found = repo.find_by_key(&key).await.unwrap().unwrap();
        assert_eq!("ULTRA CONTACT", found.name);
        assert_eq!(dec!(299.238), found.price);
        assert_eq!(Season::AllSeason, found.season);
        assert!(found.active);
        assert_eq!(
            "Continental ULTRA CONTACT 195/65R15",
            display_name(&found.brand, &found.name, &found.size)
        );
        assert!(repo
            .slug_exists("continental-ultra-contact-195-65r15")
            .await
            .unwrap());
        assert!(!repo.slug_exists("something-else").await.unwrap());
    }

    #[tokio::test]
    async fn rejects_duplicate_slugs_and_keys() {
        let repo = repo().await;
        repo.save(product("slug-a", "ULTRA CONTACT", "195/65R15"))
            .await
            .unwrap();
        assert!(repo
            .save(product("slug-a", "Other", "205/55R16"))
            .await
            .is_err());
        assert!(repo
            .save(product("slug-b", "ULTRA CONTACT", "195/65R15"))
            .await
            .is_err());
        assert_eq!(1, repo.count().await.unwrap());
    }

    #[tokio::test]
    async fn update_import_fields_leaves_stock_and_active_alone() {
        let repo = repo().await;
        let mut p = product("slug-a", "ULTRA CONTACT", "195/65R15");
        p.stock = 42;
        p.active = false;
        p.image = Some("uploads/images/row_2_tire.png".to_string());
        let key = p.natural_key();
        repo.save(p).await.unwrap();

        repo.update_import_fields(
            &key,
            ImportFields {
                description: "mise à jour".to_string(),
                price: dec!(312.75),
                season: Season::Winter,
                image: None,
            },
        )
        .await
        .unwrap();

        let updated = repo.find_by_key(&key).await.unwrap().unwrap();
        assert_eq!("mise à jour", updated.description);
        assert_eq!(dec!(312.75), updated.price);
        assert_eq!(Season::Winter, updated.season);
        assert_eq!(42, updated.stock);
        assert!(!updated.active);
        // No fresh image in the batch keeps the stored one.
        assert_eq!(
            Some("uploads/images/row_2_tire.png".to_string()),
            updated.image
        );

        repo.update_import_fields(
            &key,
            ImportFields {
                description: "mise à jour".to_string(),
                price: dec!(312.75),
                season: Season::Winter,
                image: Some("uploads/images/row_3_tire.png".to_string()),
            },
        )
        .await
        .unwrap();
        let updated = repo.find_by_key(&key).await.unwrap().unwrap();
        assert_eq!(
            Some("uploads/images/row_3_tire.png".to_string()),
            updated.image
        );
    }

    #[tokio::test]
    async fn lists_in_slug_order() {
        let repo = repo().await;
        repo.save(product("slug-b", "B", "205/55R16")).await.unwrap();
        repo.save(product("slug-a", "A", "195/65R15")).await.unwrap();
        let all = repo.list().await.unwrap();
        assert_eq!(
            vec!["slug-a", "slug-b"],
            all.iter().map(|p| p.slug.as_str()).collect::<Vec<_>>()
        );
        assert_eq!(
            Some("A".to_string()),
            repo.get_one(&"slug-a".to_string()).await.unwrap().map(|p| p.name)
        );
    }
}
