use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use std::error::Error;
use std::time::Duration;

pub const USERS: &str = "users";
pub const EXAMS: &str = "exams";
pub const RESULTS: &str = "results";
pub const INTEGRATIONS: &str = "integrations";

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    /// Connects, pings the database and makes sure the dashboard indexes exist.
    ///
    /// The database name comes from `database_name`, then from the URI path,
    /// then falls back to `default_name`.
    pub async fn new(
        uri: &str,
        database_name: Option<&str>,
        default_name: &str,
    ) -> Result<Self, Box<dyn Error>> {
        let mut client_options = ClientOptions::parse(uri).await?;

        client_options.app_name = Some("kintal".to_string());
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(2);
        client_options.max_idle_time = Some(Duration::from_secs(300));
        client_options.connect_timeout = Some(Duration::from_secs(5));
        client_options.server_selection_timeout = Some(Duration::from_secs(5));

        let db_name = database_name
            .map(str::to_string)
            .or_else(|| client_options.default_database.clone())
            .unwrap_or_else(|| default_name.to_string());

        let client = Client::with_options(client_options)?;
        let mongodb = Self::with_client(client, &db_name);

        mongodb.db.list_collection_names().await?;
        log::info!("📦 Using database '{}'", db_name);

        mongodb.ensure_indexes().await;

        Ok(mongodb)
    }

    /// Wraps an existing client without touching the network.
    pub fn with_client(client: Client, db_name: &str) -> Self {
        Self {
            db: client.database(db_name),
        }
    }

    /// Indexes backing the date filters and lookups of the dashboard.
    ///
    /// Users, exams and results are owned by Lucida, so a failure here is
    /// logged and ignored. The unique index on integrations is ours.
    async fn ensure_indexes(&self) {
        log::info!("🔧 Creating database indexes...");

        let indexes: Vec<(&str, Document, bool)> = vec![
            (USERS, doc! { "id": 1 }, false),
            (USERS, doc! { "createdAt": -1 }, false),
            (EXAMS, doc! { "userId": 1 }, false),
            (EXAMS, doc! { "createdAt": -1 }, false),
            (RESULTS, doc! { "examId": 1 }, false),
            (RESULTS, doc! { "createdAt": -1 }, false),
            (INTEGRATIONS, doc! { "integrationId": 1 }, true),
        ];

        for (collection_name, keys, unique) in indexes {
            let description = format!("{}({})", collection_name, keys);
            let model = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(unique).build())
                .build();

            match self
                .collection::<Document>(collection_name)
                .create_index(model)
                .await
            {
                Ok(_) => log::info!("   ✅ Index ready: {}", description),
                Err(e) => log::warn!("   ⚠️  Could not create index {}: {}", description, e),
            }
        }

        log::info!("✅ Database indexes ready");
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub async fn ping(&self) -> Result<(), mongodb::error::Error> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    /// Handle for handler tests that never reach the database.
    ///
    /// Parsing a plain `mongodb://` URI and building the client are both
    /// offline operations; the driver only connects on the first command.
    pub async fn offline_db() -> MongoDB {
        let options = ClientOptions::parse("mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200")
            .await
            .expect("valid test URI");
        let client = Client::with_options(options).expect("client builds offline");
        MongoDB::with_client(client, "kintal_test")
    }

    /// Fresh database on the server from `MONGODB_URI` (or `DATABASE_URL`).
    /// Each call gets its own name so ignored tests can run in parallel.
    pub async fn live_db() -> MongoDB {
        dotenv::dotenv().ok();
        let uri = std::env::var("MONGODB_URI")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let name = format!("kintal_test_{}", uuid::Uuid::new_v4().simple());

        MongoDB::new(&uri, Some(&name), &name)
            .await
            .expect("MongoDB reachable for live tests")
    }

    pub async fn drop_live_db(db: &MongoDB) {
        db.db.drop().await.expect("test database dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_mongodb_connection() {
        dotenv::dotenv().ok();
        let uri = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let db = MongoDB::new(&uri, Some("kintal_test"), "kintal_test").await;
        assert!(db.is_ok());
        assert!(db.unwrap().ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_with_client_uses_given_name() {
        let db = test_support::offline_db().await;
        let namespace = db.collection::<Document>(USERS).namespace();
        assert_eq!(namespace.db, "kintal_test");
        assert_eq!(namespace.coll, "users");
    }
}
