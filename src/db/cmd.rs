use tokio_postgres::IsolationLevel;

use crate::{prelude::*, config::Config};
use super::{Db, create_pool, query};


#[derive(Debug, clap::Subcommand)]
pub(crate) enum DbCommand {
    /// Removes all data and tables from the database.
    Clear,

    /// Runs the database migrations that also automatically run when starting
    /// the server.
    Migrate,

    /// Equivalent to `db clear` followed by `db migrate`.
    Reset,
}

/// Entry point for `db` commands.
pub(crate) async fn run(cmd: &DbCommand, config: &Config) -> Result<()> {
    // Connect to database
    let pool = create_pool(&config.db).await?;
    let mut db = pool.get().await?;

    // Dispatch command
    match cmd {
        DbCommand::Clear => clear(&mut db).await?,
        DbCommand::Migrate => super::migrate(&mut db).await?,
        DbCommand::Reset => {
            clear(&mut db).await?;
            super::migrate(&mut db).await?;
        }
    }

    Ok(())
}

/// Clears the whole database by dropping all tables in the `public` schema.
async fn clear(db: &mut Db) -> Result<()> {
    let tx = db.build_transaction()
        .isolation_level(IsolationLevel::Serializable)
        .start()
        .await?;

    let tables = query::all_table_names(&*tx).await?;
    if tables.is_empty() {
        info!("Database is already empty");
        tx.commit().await?;
        return Ok(());
    }

    info!("Dropping tables: {}", tables.join(", "));
    for table in &tables {
        // Table names come from `information_schema`, not from user input,
        // so interpolating them here is fine.
        tx.batch_execute(&format!("drop table if exists \"{table}\" cascade")).await?;
    }

    tx.commit().await.context("failed to commit clearing transaction")?;
    info!("Cleared database");

    Ok(())
}
