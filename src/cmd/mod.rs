use crate::{config::Config, db::DbMappingStore, prelude::*};

pub(crate) mod check;
pub(crate) mod cleanup;
pub(crate) mod course;
pub(crate) mod lti_launch;
pub(crate) mod mapping;
pub(crate) mod trash;


/// Reads one line from stdin and fails unless it is "yes".
pub(crate) fn prompt_for_yes() -> Result<()> {
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer).context("failed to read answer")?;
    match answer.trim() {
        "yes" => Ok(()),
        other => bail!("not confirmed (answer was '{other}'), aborting"),
    }
}

/// Connects to the DB, runs migrations and returns the mapping store.
pub(crate) async fn connect_store(config: &Config) -> Result<DbMappingStore> {
    crate::connect_and_migrate_db(config).await.map(DbMappingStore::new)
}
