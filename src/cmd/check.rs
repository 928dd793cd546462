//! A subcommand making sure various things are working. Useful after updating
//! or reconfiguring, to find problems before the first course is deleted.

use crate::{
    args::{self, Args},
    config::{Config, InstanceConfig},
    db,
    load_config_and_init_logger,
    opencast::OcClient,
    prelude::*,
};


pub(crate) async fn run(shared: &args::Shared, args: &Args) -> Result<()> {
    let config = load_config_and_init_logger(shared, args)
        .context("cannot run checks without a valid configuration")?;

    info!("Running checks");
    let db_pool = db::create_pool(&config.db).await;
    let mut opencast = vec![];
    for instance in &config.opencast.instances {
        let label = format!("Opencast instance {}", instance.label());
        opencast.push((label, check_opencast(&config, instance).await));
    }
    let trash = check_trash_dir(&config).await;
    info!("All checks done");


    let mut outcomes = vec![
        ("Configuration".to_owned(), Ok(())),
        ("Database connection".to_owned(), db_pool.map(drop)),
    ];
    outcomes.extend(opencast);
    outcomes.push(("Trash directory".to_owned(), trash));

    println!();
    bunt::println!("{$bold+blue+intense}Summary{/$}");
    println!();
    let mut failed = 0;
    for (label, outcome) in &outcomes {
        match outcome {
            Ok(()) => bunt::println!(" ▸ {[bold+intense]}  {$green+bold}✔ ok{/$}", label),
            Err(e) => {
                failed += 1;
                bunt::println!(" ▸ {[bold+intense]}  {$red+bold}✘ error{/$}", label);
                print_error(e);
            }
        }
    }

    println!();
    if failed > 0 {
        bunt::println!("{$red+intense}➡  {} of {} checks failed{/$}", failed, outcomes.len());
        std::process::exit(1);
    }
    bunt::println!("{$green+intense}⮕  Everything OK{/$}");
    Ok(())
}

fn print_error(e: &anyhow::Error) {
    bunt::println!("      {$red}▶▶▶ {$bold}Error:{/$}{/$} {[yellow+intense]}", e);
    for (depth, cause) in e.chain().skip(1).enumerate() {
        println!("       {:indent$}‣ {cause}", "", indent = depth * 2);
    }
    println!();
}

async fn check_opencast(config: &Config, instance: &InstanceConfig) -> Result<()> {
    let client = OcClient::new(crate::util::http_client()?, instance, config.opencast.timeout);
    let versions = client.external_api_versions().await?;
    debug!(
        "Instance {} supports external API {:?} (default {})",
        instance.label(),
        versions.versions,
        versions.default,
    );
    Ok(())
}

async fn check_trash_dir(config: &Config) -> Result<()> {
    let dir = &config.files.trash_dir;
    let meta = tokio::fs::metadata(dir).await
        .with_context(|| format!("could not access '{}'", dir.display()))?;
    if !meta.is_dir() {
        bail!("'{}' is not a directory", dir.display());
    }
    Ok(())
}
