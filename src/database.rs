use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

pub type Database = Pool<Postgres>;

pub async fn create_database_pool(name: &str, database_url: &str) -> Result<Database, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    // Fail at start-up rather than on the first request.
    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    log::info!("connected to {} database", name);
    Ok(pool)
}
