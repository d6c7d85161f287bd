use async_trait::async_trait;
use time::OffsetDateTime;
use typesafe_repository::async_ops::Get;
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;
use uuid::Uuid;

#[derive(Id, Clone, Debug)]
pub struct Category {
    #[id]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub created_at: OffsetDateTime,
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Category {}

#[async_trait]
pub trait CategoryRepository:
    Repository<Category, Error = anyhow::Error> + Get<Category> + Send + Sync
{
    /// Fetches the category with the given name, creating it with the
    /// provided slug and description when it does not exist yet.
    async fn get_or_create(
        &self,
        name: &str,
        slug: &str,
        description: &str,
    ) -> Result<Category, Self::Error>;

    async fn count(&self) -> Result<usize, Self::Error>;
}
