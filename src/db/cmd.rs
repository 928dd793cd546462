use std::{
    io,
    os::unix::process::CommandExt,
    path::{Path, PathBuf},
    process::Command,
};
use secrecy::ExposeSecret;
use tokio_postgres::IsolationLevel;

use crate::{prelude::*, config::Config};
use super::{Db, DbConfig, create_pool, query};


#[derive(Debug, clap::Subcommand)]
pub(crate) enum DbCommand {
    /// Applies pending migrations. `serve` does this on startup as well.
    Migrate,

    /// Drops every table, including all course mirror rows and series
    /// mappings.
    Clear {
        /// Don't ask for confirmation.
        #[clap(long)]
        yes_absolutely_clear: bool,
    },

    /// Executes the given SQL file against the configured database.
    Script {
        script: PathBuf,
    },

    /// Opens `psql` connected to the configured database. `psql` needs to be
    /// in your `PATH`.
    Console,
}

pub(crate) async fn run(cmd: &DbCommand, config: &Config) -> Result<()> {
    if let DbCommand::Console = cmd {
        return console(&config.db);
    }

    let pool = create_pool(&config.db).await?;
    let mut db = pool.get().await?;
    match cmd {
        DbCommand::Migrate => super::migrate(&mut db).await,
        DbCommand::Clear { yes_absolutely_clear } => {
            clear(&mut db, config, *yes_absolutely_clear).await
        }
        DbCommand::Script { script } => run_script(&db, script).await,
        DbCommand::Console => unreachable!(),
    }
}


async fn clear(db: &mut Db, config: &Config, yes: bool) -> Result<()> {
    let tx = db.build_transaction()
        .isolation_level(IsolationLevel::Serializable)
        .start()
        .await?;

    let tables = query::all_table_names(&*tx).await?;
    println!();
    bunt::println!(
        "Database {[bold]} on {[bold]} contains {} tables:",
        config.db.database,
        config.db.host,
        tables.len(),
    );
    for table in &tables {
        let rows: i64 = tx.query_one(&*format!("select count(*) from {table}"), &[])
            .await?
            .get(0);
        println!("  {table}: {rows} rows");
    }

    if !yes {
        println!();
        bunt::println!(
            "{$red+bold}This drops the 'public' schema and everything in it.{/$} \
                Type 'yes' to continue.",
        );
        crate::cmd::prompt_for_yes()?;
    }

    tx.batch_execute(&format!(
        "drop schema public cascade;\n\
         create schema public;\n\
         grant all on schema public to {};\n\
         grant all on schema public to public;",
        config.db.user,
    )).await.context("failed to recreate 'public' schema")?;
    tx.commit().await.context("failed to commit")?;

    info!("Database cleared");
    Ok(())
}

async fn run_script(db: &Db, path: &Path) -> Result<()> {
    let script = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("could not read '{}'", path.display()))?;

    db.batch_execute(&script).await
        .with_context(|| format!("script '{}' failed", path.display()))?;
    info!("Executed '{}'", path.display());
    Ok(())
}

/// Replaces the current process with `psql`, so this only returns on error.
fn console(config: &DbConfig) -> Result<()> {
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
    let enc = |s| utf8_percent_encode(s, NON_ALPHANUMERIC);

    let uri = format!(
        "postgresql://{}:{}@{}:{}/{}",
        enc(&config.user),
        enc(config.password.expose_secret()),
        config.host,
        config.port,
        enc(&config.database),
    );
    let err = Command::new("psql").arg(uri).exec();
    let msg = match err.kind() {
        io::ErrorKind::NotFound => "could not find `psql` in `PATH`",
        io::ErrorKind::PermissionDenied => "not allowed to execute `psql`",
        _ => "failed to start `psql`",
    };
    Err(err).context(msg)
}
