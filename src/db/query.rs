//! Queries against `information_schema`.

use tokio_postgres::GenericClient;

use crate::prelude::*;


pub(super) async fn all_table_names(db: &impl GenericClient) -> Result<Vec<String>> {
    let sql = "select table_name::text \
        from information_schema.tables \
        where table_schema = 'public' and table_type = 'BASE TABLE' \
        order by table_name";
    let rows = db.query(sql, &[]).await.context("failed to list tables")?;
    Ok(rows.into_iter().map(|row| row.get(0)).collect())
}

pub(super) async fn does_table_exist(db: &impl GenericClient, name: &str) -> Result<bool> {
    let sql = "select exists(select 1 from information_schema.tables \
        where table_schema = 'public' and table_name = $1)";
    let row = db.query_one(sql, &[&name]).await
        .with_context(|| format!("failed to check whether table '{name}' exists"))?;
    Ok(row.get(0))
}
