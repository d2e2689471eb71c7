use mongodb::bson::doc;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{de::DeserializeOwned, Serialize};

pub const REVIEWS: &str = "reviews";
pub const PROPERTIES: &str = "properties";
pub const PROPERTY_VIEWS: &str = "property_views";
pub const USERS: &str = "users";
pub const AGENTS: &str = "agents";
pub const SELLERS: &str = "sellers";
pub const CLIENTS: &str = "clients";
pub const TRANSACTIONS: &str = "transactions";
pub const CITIES: &str = "cities";
pub const PROPERTY_TYPES: &str = "property_types";
pub const AMENITIES: &str = "amenities";
pub const NOTIFICATIONS: &str = "notifications";
pub const ACTIVITIES: &str = "activities";

pub struct MongoDB {
    pub client: Client,
    pub db: Database,
}

impl MongoDB {
    pub async fn init(uri: &str, db_name: &str) -> mongodb::error::Result<Self> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);
        Ok(MongoDB { client, db })
    }

    pub fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Send + Sync + Serialize + DeserializeOwned,
    {
        self.db.collection::<T>(name)
    }

    /// Unique email per user and one profile per user in each role collection.
    pub async fn ensure_indexes(&self) -> mongodb::error::Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.db
            .collection::<mongodb::bson::Document>(USERS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        for profiles in [AGENTS, SELLERS, CLIENTS] {
            self.db
                .collection::<mongodb::bson::Document>(profiles)
                .create_index(
                    IndexModel::builder()
                        .keys(doc! { "user_id": 1 })
                        .options(unique())
                        .build(),
                )
                .await?;
        }

        self.db
            .collection::<mongodb::bson::Document>(PROPERTY_VIEWS)
            .create_index(IndexModel::builder().keys(doc! { "viewed_at": 1 }).build())
            .await?;

        Ok(())
    }
}
