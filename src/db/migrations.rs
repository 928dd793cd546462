//! Schema migrations. The scripts in `migrations/` are embedded into the
//! binary and recorded in the `__db_migrations` table once applied.

use chrono::{DateTime, NaiveDateTime, Utc};
use deadpool_postgres::Transaction;
use once_cell::sync::Lazy;
use std::{collections::BTreeMap, time::Duration};
use tokio_postgres::{IsolationLevel, error::SqlState};

use crate::prelude::*;
use super::{query, Db};


#[derive(Debug)]
struct Migration {
    name: &'static str,
    script: &'static str,
}

/// A migration as recorded in the database.
#[derive(Debug)]
struct AppliedMigration {
    name: String,
    applied_on: DateTime<Utc>,
    script: String,
}

/// What needs to happen to bring the database up to date.
#[derive(Debug, PartialEq, Eq)]
enum Plan {
    /// Nothing in the DB yet: create the meta table, then apply everything.
    Bootstrap,
    /// Apply all migrations with ID greater than `after`.
    ApplyAfter { after: u64 },
    UpToDate,
}


/// Makes sure the database schema is up to date by checking the applied
/// migrations and applying the missing ones. Anything unexpected (unknown or
/// modified migrations) is an error the admin has to deal with manually.
pub(crate) async fn migrate(db: &mut Db) -> Result<()> {
    // Serializable, so that only one process ever migrates. Those can fail on
    // commit, in which case we retry and see the other process' result.
    const RETRY_DELAY: Duration = Duration::from_millis(500);

    loop {
        let tx = db.build_transaction()
            .isolation_level(IsolationLevel::Serializable)
            .start()
            .await?;

        let plan = plan(&tx).await?;
        execute(&plan, &tx).await?;

        match tx.commit().await {
            Ok(()) => return Ok(()),
            Err(e) if e.code() == Some(&SqlState::T_R_SERIALIZATION_FAILURE) => {
                warn!(
                    "Committing the migration transaction failed, probably because another \
                        process migrated concurrently. Retrying in {RETRY_DELAY:?}.",
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => return Err(e).context("failed to commit migration transaction"),
        }
    }
}

async fn plan(tx: &Transaction<'_>) -> Result<Plan> {
    if !query::does_table_exist(&**tx, "__db_migrations").await? {
        let tables = query::all_table_names(&**tx).await?;
        if !tables.is_empty() {
            bail!(
                "the database contains tables ({}) but no '__db_migrations' table. \
                    Refusing to touch a database not managed by coursecast.",
                tables.join(", "),
            );
        }
        return Ok(Plan::Bootstrap);
    }

    let applied = applied_migrations(tx).await?;
    check_applied(&applied)?;

    let after = applied.len() as u64;
    if after == MIGRATIONS.len() as u64 {
        Ok(Plan::UpToDate)
    } else {
        Ok(Plan::ApplyAfter { after })
    }
}

async fn applied_migrations(tx: &Transaction<'_>) -> Result<BTreeMap<u64, AppliedMigration>> {
    let rows = tx.query("select id, name, applied_on, script from __db_migrations", &[])
        .await
        .context("failed to read '__db_migrations'")?;

    let out = rows.into_iter()
        .map(|row| {
            let applied_on = row.get::<_, NaiveDateTime>("applied_on").and_utc();
            let migration = AppliedMigration {
                name: row.get("name"),
                applied_on,
                script: row.get("script"),
            };
            (row.get::<_, i64>("id") as u64, migration)
        })
        .collect();

    Ok(out)
}

/// Checks that the applied migrations are a prefix of the known ones.
fn check_applied(applied: &BTreeMap<u64, AppliedMigration>) -> Result<()> {
    if !applied.keys().copied().eq(1..=applied.len() as u64) {
        bail!("IDs in '__db_migrations' are not consecutive, the table was modified by hand");
    }

    for (id, applied) in applied {
        let Some(known) = MIGRATIONS.get(id) else {
            bail!(
                "migration {id}-{} (applied on {}) is unknown to this version of coursecast. \
                    Was the database used with a newer version?",
                applied.name,
                applied.applied_on,
            );
        };

        if applied.script != known.script {
            debug!("Script of {id}-{} in the database:\n{}", applied.name, applied.script);
            debug!("Expected script of {id}-{}:\n{}", known.name, known.script);
            bail!(
                "the script of migration {id}-{} (applied on {}) differs from the \
                    embedded one",
                applied.name,
                applied.applied_on,
            );
        }
    }

    Ok(())
}

async fn execute(plan: &Plan, tx: &Transaction<'_>) -> Result<()> {
    let after = match *plan {
        Plan::UpToDate => {
            info!("Database schema is up to date");
            return Ok(());
        }
        Plan::Bootstrap => {
            info!("Database is empty, creating '__db_migrations'");
            tx.batch_execute(include_str!("db-migrations.sql"))
                .await
                .context("failed to create '__db_migrations'")?;
            0
        }
        Plan::ApplyAfter { after } => after,
    };

    let missing = MIGRATIONS.range(after + 1..).collect::<Vec<_>>();
    info!("Applying {} migrations", missing.len());
    for (id, migration) in missing {
        debug!("Applying migration {id}-{}", migration.name);
        trace!("Script:\n{}", migration.script);

        tx.batch_execute(migration.script)
            .await
            .with_context(|| format!("failed to run migration {id}-{}", migration.name))?;
        tx.execute(
            "insert into __db_migrations (id, name, applied_on, script) \
                values ($1, $2, now() at time zone 'utc', $3)",
            &dbargs![&(*id as i64), &migration.name, &migration.script],
        ).await.context("failed to record migration in '__db_migrations'")?;
    }

    Ok(())
}


/// Embeds `migrations/<id>-<name>.sql` for each entry. IDs must start at 1
/// and be consecutive.
macro_rules! include_migrations {
    ( $( $id:literal : $name:literal ,)+ ) => {
        Lazy::new(|| {
            let m = BTreeMap::from([
                $((
                    $id,
                    Migration {
                        name: $name,
                        script: include_str!(
                            concat!("migrations/", stringify!($id), "-", $name, ".sql")
                        ),
                    },
                ),)+
            ]);
            assert!(
                m.keys().copied().eq(1..=m.len() as u64),
                "migration IDs in `include_migrations!` are not consecutive",
            );
            m
        })
    };
}

static MIGRATIONS: Lazy<BTreeMap<u64, Migration>> = include_migrations![
    01: "courses",
    02: "course-series",
];


#[cfg(test)]
mod tests {
    use chrono::Utc;
    use std::collections::BTreeMap;
    use super::{check_applied, AppliedMigration, MIGRATIONS};

    fn applied(ids: &[u64]) -> BTreeMap<u64, AppliedMigration> {
        ids.iter()
            .map(|id| {
                let known = &MIGRATIONS[id];
                (*id, AppliedMigration {
                    name: known.name.into(),
                    applied_on: Utc::now(),
                    script: known.script.into(),
                })
            })
            .collect()
    }

    #[test]
    fn embedded_migrations() {
        assert_eq!(MIGRATIONS.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        for migration in MIGRATIONS.values() {
            assert!(migration.script.contains("create table"), "{}", migration.name);
        }
    }

    #[test]
    fn applied_prefix_is_fine() {
        check_applied(&applied(&[])).unwrap();
        check_applied(&applied(&[1])).unwrap();
        check_applied(&applied(&[1, 2])).unwrap();
    }

    #[test]
    fn gaps_and_modified_scripts_are_rejected() {
        check_applied(&applied(&[2])).unwrap_err();

        let mut modified = applied(&[1]);
        modified.get_mut(&1).unwrap().script.push_str("\n-- changed");
        check_applied(&modified).unwrap_err();
    }

    #[test]
    fn unknown_migration_is_rejected() {
        let mut unknown = applied(&[1, 2]);
        unknown.insert(3, AppliedMigration {
            name: "future".into(),
            applied_on: Utc::now(),
            script: String::new(),
        });
        check_applied(&unknown).unwrap_err();
    }
}
