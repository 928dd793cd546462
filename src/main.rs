//! The coursecast backend: course integration service for Opencast.

use clap::{FromArgMatches, CommandFactory};
use deadpool_postgres::Pool;
use std::env;

use crate::{
    args::{Args, Command},
    config::Config,
    prelude::*,
};

mod args;
mod cleanup;
mod cmd;
mod config;
mod db;
mod events;
mod files;
mod forms;
mod http;
mod logger;
mod lti;
mod model;
mod opencast;
mod prelude;
mod table;
mod util;
mod version;


#[tokio::main]
async fn main() {
    let Err(e) = run().await else {
        return;
    };

    // Also goes to the log file, which might be all an admin looks at.
    error!("{e:?}");

    eprintln!();
    bunt::eprintln!("{$red}▶▶▶ {$bold}Error:{/$}{/$} {[yellow+intense]}", e);
    let mut causes = e.chain().skip(1).peekable();
    if causes.peek().is_some() {
        eprintln!();
        bunt::eprintln!("{$red+italic}Caused by:{/$}");
    }
    for (depth, cause) in causes.enumerate() {
        eprintln!(" {:indent$}‣ {cause}", "", indent = depth * 2);
    }

    std::process::exit(1);
}

async fn run() -> Result<()> {
    if env::var_os("RUST_BACKTRACE").is_none() {
        env::set_var("RUST_BACKTRACE", "1");
    }

    // The version string is only known at runtime.
    let matches = Args::command().version(version::full()).get_matches();
    let args = Args::from_arg_matches(&matches)?;

    bunt::set_stdout_color_choice(args.stdout_color());
    bunt::set_stderr_color_choice(args.stderr_color());

    match &args.cmd {
        Command::Serve { shared } => {
            let config = load_config_and_init_logger(shared, &args)?;
            start_server(config).await
        }
        Command::Cleanup { args: cleanup_args, shared } => {
            let config = load_config_and_init_logger(shared, &args)?;
            cmd::cleanup::run(cleanup_args, &config).await
        }
        Command::Course { cmd, shared } => {
            let config = load_config_and_init_logger(shared, &args)?;
            cmd::course::run(cmd, &config).await
        }
        Command::Mapping { cmd, shared } => {
            let config = load_config_and_init_logger(shared, &args)?;
            cmd::mapping::run(cmd, &config).await
        }
        Command::Db { cmd, shared } => {
            let config = load_config_and_init_logger(shared, &args)?;
            db::cmd::run(cmd, &config).await
        }
        Command::Trash { cmd, shared } => {
            let config = load_config_and_init_logger(shared, &args)?;
            cmd::trash::run(cmd, &config).await
        }
        Command::LtiLaunch { args: lti_args, shared } => {
            let config = load_config_and_init_logger(shared, &args)?;
            cmd::lti_launch::run(lti_args, &config)
        }
        Command::Check { shared } => cmd::check::run(shared, &args).await,
        Command::WriteConfig { target } => config::write_template(target.as_ref()),
    }
}

async fn start_server(config: Config) -> Result<()> {
    info!("Starting coursecast {}", version::identifier());
    trace!("Configuration: {config:#?}");

    let pool = connect_and_migrate_db(&config).await?;
    http::serve(config, pool).await.context("HTTP server failed")
}

/// Loads the config from `--config` or the default locations, then sets up
/// logging as configured there.
fn load_config_and_init_logger(shared: &args::Shared, args: &Args) -> Result<Config> {
    let (config, path) = match &shared.config {
        Some(path) => (Config::load_from(path)?, path.clone()),
        None => Config::from_env_or_default_locations()?,
    };

    logger::init(&config.log, args, args.cmd.log_name())?;
    info!("Loaded config from '{}'", path.display());
    Ok(config)
}

async fn connect_and_migrate_db(config: &Config) -> Result<Pool> {
    let pool = db::create_pool(&config.db).await
        .context("could not set up database connection pool")?;
    let mut conn = pool.get().await.context("could not get DB connection")?;
    db::migrate(&mut conn).await.context("database migration failed")?;
    Ok(pool)
}
