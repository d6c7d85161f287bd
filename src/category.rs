use async_trait::async_trait;
use pneu_types::category::{Category, CategoryRepository};
use rusqlite::params;
use time::OffsetDateTime;
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::Get;
use typesafe_repository::prelude::*;
use uuid::Uuid;

pub struct SqliteCategoryRepository {
    conn: Connection,
}

impl SqliteCategoryRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS category (
                    id BLOB PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    slug TEXT NOT NULL UNIQUE,
                    description TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

fn read_category(row: &rusqlite::Row<'_>) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl Repository<Category> for SqliteCategoryRepository {
    type Error = anyhow::Error;
}

#[async_trait]
impl Get<Category> for SqliteCategoryRepository {
    async fn get_one(&self, id: &IdentityOf<Category>) -> Result<Option<Category>, Self::Error> {
        let id = *id;
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, slug, description, created_at FROM category WHERE id = ?1",
                )?;
                let c = stmt
                    .query_map([id], |row| read_category(row))?
                    .collect::<Result<Vec<_>, _>>();
                Ok(c?.pop())
            })
            .await?)
    }
}

#[async_trait]
impl CategoryRepository for SqliteCategoryRepository {
    async fn get_or_create(
        &self,
        name: &str,
        slug: &str,
        description: &str,
    ) -> Result<Category, Self::Error> {
        let name = name.to_string();
        let slug = slug.to_string();
        let description = description.to_string();
        Ok(self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO category (id, name, slug, description, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(name) DO NOTHING",
                    params![
                        Uuid::new_v4(),
                        name,
                        slug,
                        description,
                        OffsetDateTime::now_utc()
                    ],
                )?;
                let mut stmt = conn.prepare(
                    "SELECT id, name, slug, description, created_at FROM category WHERE name = ?1",
                )?;
                let c = stmt.query_row([&name], |row| read_category(row))?;
                Ok(c)
            })
            .await?)
    }

    async fn count(&self) -> Result<usize, Self::Error> {
        let res = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT COUNT(*) FROM category")?;
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

    #[tokio::test]
    async fn get_or_create_is_idempotent_by_name() {
        let conn = Connection::open_in_memory().await.unwrap();
        let repo = SqliteCategoryRepository::init(conn).await.unwrap();

        let first = repo
            .get_or_create("Continental", "continental", "Pneus Continental")
            .await
            .unwrap();
        let second = repo
            .get_or_create("Continental", "continental", "ignored on re-run")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!("Pneus Continental", second.description);
        assert_eq!(1, repo.count().await.unwrap());
        assert_eq!(
            Some("continental".to_string()),
            repo.get_one(&first.id).await.unwrap().map(|c| c.slug)
        );
    }
}
