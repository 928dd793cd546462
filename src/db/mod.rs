//! Database related things.

use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use secrecy::{ExposeSecret, SecretString};
use std::{
    fs,
    path::{PathBuf, Path},
};
use tokio_postgres::NoTls;

use crate::prelude::*;


pub(crate) mod cmd;
mod mapping;
mod migrations;
mod query;
pub(crate) mod util;

pub(crate) use self::{
    mapping::{DbMappingStore, MappingStore},
    migrations::migrate,
};


#[derive(Debug, confique::Config)]
pub(crate) struct DbConfig {
    /// Database user coursecast logs in as.
    #[config(default = "coursecast")]
    pub(crate) user: String,

    /// Password for `user`.
    pub(crate) password: SecretString,

    /// Host of the PostgreSQL server.
    #[config(default = "127.0.0.1")]
    pub(crate) host: String,

    /// Port of the PostgreSQL server.
    #[config(default = 5432)]
    pub(crate) port: u16,

    /// Name of the database holding the course mirror and series mappings.
    #[config(default = "coursecast")]
    pub(crate) database: String,

    /// Whether to encrypt the connection:
    ///
    /// - "on": TLS is required. The server certificate has to be signed by
    ///    a CA from the system certificate store or by `server_cert`.
    /// - "off": plain TCP. Only use this for local databases.
    #[config(default = "on")]
    pub(crate) tls_mode: TlsMode,

    /// PEM file with one or more additional X509 certificates to trust, e.g.
    /// a self-signed server certificate.
    pub(crate) server_cert: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum TlsMode {
    Off,
    On,
}

impl DbConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.server_cert.is_some() && self.tls_mode != TlsMode::On {
            bail!(r#"`db.server_cert` only has an effect with `db.tls_mode = "on"`"#);
        }

        Ok(())
    }
}

/// A client borrowed from the pool.
pub(crate) type Db = deadpool_postgres::ClientWrapper;

pub(crate) type DbConnection = deadpool::managed::Object<deadpool_postgres::Manager>;


/// Creates the connection pool and checks that the database is usable.
pub(crate) async fn create_pool(config: &DbConfig) -> Result<Pool> {
    let pool_config = PoolConfig {
        user: Some(config.user.clone()),
        password: Some(config.password.expose_secret().to_owned()),
        host: Some(config.host.clone()),
        port: Some(config.port),
        dbname: Some(config.database.clone()),
        ssl_mode: Some(match config.tls_mode {
            TlsMode::Off => deadpool_postgres::SslMode::Disable,
            TlsMode::On => deadpool_postgres::SslMode::Require,
        }),
        application_name: Some("coursecast".into()),
        .. PoolConfig::default()
    };

    debug!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        user = %config.user,
        tls = ?config.tls_mode,
        "Connecting to PostgreSQL",
    );

    let pool = match config.tls_mode {
        TlsMode::Off => pool_config.create_pool(Some(Runtime::Tokio1), NoTls)?,
        TlsMode::On => {
            let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config(config)?);
            pool_config.create_pool(Some(Runtime::Tokio1), tls)?
        }
    };

    check_connection(&pool).await?;
    info!("Database pool ready");
    Ok(pool)
}

/// Trusts the system certificates plus `server_cert`, if configured.
fn tls_config(config: &DbConfig) -> Result<rustls::ClientConfig> {
    let mut roots = rustls::RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for e in &native.errors {
        warn!("Could not load a system certificate: {e}");
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    debug!("Trusting {added} system certificates ({ignored} unparsable)");

    if let Some(path) = &config.server_cert {
        let count = add_pem_certs(path, &mut roots)
            .with_context(|| format!("failed to load server certificate '{}'", path.display()))?;
        debug!("Trusting {count} certificates from '{}'", path.display());
    }

    Ok(rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth())
}

/// Runs a trivial query and makes sure the server encoding is UTF8.
async fn check_connection(pool: &Pool) -> Result<()> {
    let client = pool.get().await.context("could not connect to database")?;
    client.execute("select 1", &[]).await.context("test query failed")?;

    let encoding: String = client.query_one("show server_encoding", &[]).await
        .context("failed to query server encoding")?
        .get(0);
    if encoding != "UTF8" {
        bail!("database uses encoding '{encoding}', but coursecast needs UTF8");
    }

    Ok(())
}

/// Adds all X509 certificates of the PEM file at `path` to `roots` and
/// returns how many there were.
fn add_pem_certs(path: &Path, roots: &mut rustls::RootCertStore) -> Result<usize> {
    let pem = fs::read(path).context("could not read file")?;

    let mut count = 0;
    for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
        roots.add(cert.context("invalid PEM")?).context("invalid X509 certificate")?;
        count += 1;
    }

    if count == 0 {
        bail!("file contains no X509 certificate");
    }
    Ok(count)
}
