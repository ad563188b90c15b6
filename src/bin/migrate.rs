use jewel_commerce::db::{create_orm_conn, run_migrations};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL is not set"))?;
    let orm = create_orm_conn(&database_url).await?;
    let applied = run_migrations(&orm).await?;
    if applied.is_empty() {
        println!("Schema is up to date");
    }
    for version in applied {
        println!("Applied {version}");
    }
    Ok(())
}
