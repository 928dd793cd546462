//! Runs the course cleanup by hand, e.g. for courses whose deletion event
//! was lost.

use crate::{cleanup::CourseCleanup, config::Config, model::CourseId, prelude::*};


#[derive(Debug, clap::Args)]
pub(crate) struct Args {
    /// ID of a deleted course. Can be given multiple times.
    #[clap(long = "course", required = true)]
    courses: Vec<i64>,
}

pub(crate) async fn run(args: &Args, config: &Config) -> Result<()> {
    let store = super::connect_store(config).await?;
    let cleanup = CourseCleanup::from_config(&config.opencast, store.clone())?;

    let mut any_failures = false;
    for &id in &args.courses {
        let course = CourseId(id);
        if store.course(course).await?.is_some() {
            warn!("Course {course} still exists in the course table, cleaning up as if it \
                was deleted");
        }

        let report = cleanup.run(course).await;
        bunt::println!("{$bold}Course {}:{/$} {}", course, report);
        any_failures |= report.has_failures();
    }

    if any_failures {
        bail!("cleanup finished with errors (see log)");
    }
    Ok(())
}
