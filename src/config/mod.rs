use std::{
    fmt, fs, io::{self, Write}, net::{Ipv4Addr, Ipv6Addr}, path::{Path, PathBuf}, str::FromStr, time::Duration
};
use confique::Config as _;
use hyper::Uri;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::prelude::*;


mod general;
mod opencast;

pub(crate) use self::{
    general::GeneralConfig,
    opencast::{InstanceConfig, LtiCredentials, OpencastConfig},
};


/// Checked in order when neither `--config` nor `COURSECAST_CONFIG_PATH` is
/// given.
const DEFAULT_PATHS: &[&str] = &[
    "config.toml",
    "/etc/coursecast/config.toml",
];

const CONFIG_PATH_ENV: &str = "COURSECAST_CONFIG_PATH";

/// Configuration for coursecast.
///
/// Relative paths are resolved against the directory of this file. Durations
/// are strings with a unit ('ms', 's', 'min', 'h' or 'd'), e.g. "30s".
#[derive(Debug, confique::Config)]
pub(crate) struct Config {
    #[config(nested)]
    pub(crate) general: GeneralConfig,

    #[config(nested)]
    pub(crate) db: crate::db::DbConfig,

    #[config(nested)]
    pub(crate) http: crate::http::HttpConfig,

    #[config(nested)]
    pub(crate) log: crate::logger::LogConfig,

    #[config(nested)]
    pub(crate) opencast: OpencastConfig,

    #[config(nested)]
    pub(crate) files: crate::files::FilesConfig,
}

impl Config {
    /// Loads the file named by `COURSECAST_CONFIG_PATH` or else the first
    /// existing one of `DEFAULT_PATHS`. Also returns the path used.
    pub fn from_env_or_default_locations() -> Result<(Self, PathBuf)> {
        let path = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => DEFAULT_PATHS.iter()
                .map(PathBuf::from)
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!(
                    "no configuration file found (looked at: {})",
                    DEFAULT_PATHS.join(", "),
                ))?,
        };

        let config = Self::load_from(&path)
            .with_context(|| format!("failed to load configuration '{}'", path.display()))?;
        Ok((config, path))
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Config::from_file(path)
            .with_context(|| format!("could not read '{}'", path.display()))?;

        config.resolve_paths(path)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.db.validate()?;
        self.opencast.validate()?;
        Ok(())
    }

    /// Makes all relative paths absolute, using the directory of the config
    /// file as base.
    fn resolve_paths(&mut self, config_path: &Path) -> Result<()> {
        let config_path = config_path.canonicalize()
            .context("could not canonicalize config path")?;
        let base = config_path.parent()
            .ok_or_else(|| anyhow!("config path has no parent directory"))?;
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        if let Some(file) = &mut self.log.file {
            resolve(file);
        }
        if let Some(cert) = &mut self.db.server_cert {
            resolve(cert);
        }
        resolve(&mut self.files.trash_dir);
        Ok(())
    }
}

/// Writes a commented config template with all defaults to `path`, or stdout.
pub(crate) fn write_template(path: Option<&PathBuf>) -> Result<()> {
    use confique::toml::FormatOptions;

    let mut options = FormatOptions::default();
    options.general.nested_field_gap = 2;
    let template = confique::toml::template::<Config>(options);

    match path {
        Some(path) => {
            info!("Writing config template to '{}'", path.display());
            fs::write(path, template)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
        }
        None => io::stdout().write_all(template.as_bytes())?,
    }
    Ok(())
}

/// Deserializes a duration like "30s". A unit is required, except for "0".
pub(crate) fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    if unit.is_empty() {
        return Err(format!("duration '{s}' has no unit"));
    }
    let num: u64 = num.parse::<u32>()
        .map_err(|e| format!("invalid number in duration '{s}': {e}"))?
        .into();

    let secs = |factor: u64| Duration::from_secs(num * factor);
    match unit {
        "ms" => Ok(Duration::from_millis(num)),
        "s" => Ok(secs(1)),
        "min" => Ok(secs(60)),
        "h" => Ok(secs(60 * 60)),
        "d" => Ok(secs(24 * 60 * 60)),
        other => Err(format!("unknown duration unit '{other}'")),
    }
}

/// Whether `host` (as it appears in a URL) refers to the local machine.
/// Only meant to catch configuration mistakes: "localhost" is trusted as is.
fn is_loopback_host(host: &str) -> bool {
    if let Some(v6) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        return v6.parse::<Ipv6Addr>().is_ok_and(|ip| ip.is_loopback());
    }
    match host.parse::<Ipv4Addr>() {
        Ok(ip) => ip.is_loopback(),
        Err(_) => host == "localhost",
    }
}

/// Parses an HTTP(S) URL without query, userinfo or fragment. Plain `http` is
/// only accepted for loopback hosts or when the URL ends in
/// `#allow-insecure`.
pub(crate) fn parse_normal_http_uri(src: &str) -> Result<Uri> {
    const ALLOW_INSECURE: &str = "allow-insecure";

    let url: Url = src.parse().map_err(|e| anyhow!("invalid URL '{src}': {e}"))?;
    let scheme = url.scheme();
    anyhow::ensure!(scheme == "http" || scheme == "https", "scheme has to be 'http' or 'https'");
    anyhow::ensure!(url.query().is_none(), "URL must not have a query");
    anyhow::ensure!(
        url.username().is_empty() && url.password().is_none(),
        "URL must not contain credentials",
    );

    let insecure_allowed = match url.fragment() {
        None => false,
        Some(ALLOW_INSECURE) => true,
        Some(_) => bail!("URL must not have a fragment (other than '#{ALLOW_INSECURE}')"),
    };

    let host = url.host_str().ok_or_else(|| anyhow!("URL has no host"))?;
    if scheme == "http" && !insecure_allowed && !is_loopback_host(host) {
        bail!(
            "refusing unencrypted HTTP to non-local host '{host}'. \
                Append '#{ALLOW_INSECURE}' to the URL if you really want this.",
        );
    }

    Uri::builder()
        .scheme(scheme)
        .authority(url.authority())
        .path_and_query(url.path())
        .build()
        .context("failed to build URI")
}


/// Scheme and authority of an HTTP server, e.g. `https://oc.my-uni.edu`.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub(crate) struct HttpHost {
    pub(crate) scheme: hyper::http::uri::Scheme,
    pub(crate) authority: hyper::http::uri::Authority,
}

impl HttpHost {
    pub fn with_path_and_query(&self, pq: &str) -> Result<Uri> {
        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(pq)
            .build()
            .with_context(|| format!("invalid URI path+query '{pq}'"))
    }
}

impl fmt::Display for HttpHost {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}

impl fmt::Debug for HttpHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<HttpHost> for String {
    fn from(value: HttpHost) -> Self {
        value.to_string()
    }
}

impl FromStr for HttpHost {
    type Err = anyhow::Error;
    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let parts = parse_normal_http_uri(src)?.into_parts();
        if parts.path_and_query.as_ref().is_some_and(|pq| !matches!(pq.as_str(), "" | "/")) {
            bail!("'{src}' must not contain a path, only scheme and host");
        }

        match (parts.scheme, parts.authority) {
            (Some(scheme), Some(authority)) => Ok(Self { scheme, authority }),
            _ => bail!("'{src}' needs a scheme and a host"),
        }
    }
}

impl TryFrom<String> for HttpHost {
    type Error = <Self as FromStr>::Err;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
