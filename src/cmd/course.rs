//! Managing the course mirror by hand.

use crate::{
    config::Config,
    events::{CourseEvent, EventBus},
    cleanup::CourseCleanup,
    model::{Course, CourseId},
    prelude::*,
};


#[derive(Debug, clap::Subcommand)]
pub(crate) enum CourseCommand {
    /// Adds a course to the mirror table or updates its names.
    Add {
        id: i64,
        shortname: String,
        fullname: String,
    },

    /// Removes a course from the mirror table and runs the deletion cleanup,
    /// just like `DELETE /courses/{id}` does.
    Remove {
        id: i64,

        /// Only remove the row, do not clean up Opencast.
        #[clap(long)]
        no_cleanup: bool,
    },

    /// Lists all courses in the mirror table.
    List,
}

pub(crate) async fn run(cmd: &CourseCommand, config: &Config) -> Result<()> {
    let store = super::connect_store(config).await?;

    match cmd {
        CourseCommand::Add { id, shortname, fullname } => {
            let course = Course {
                id: CourseId(*id),
                shortname: shortname.clone(),
                fullname: fullname.clone(),
            };
            store.upsert_course(&course).await?;
            info!("Stored course {}", course.id);
        }
        CourseCommand::Remove { id, no_cleanup } => {
            let id = CourseId(*id);
            if !store.remove_course(id).await? {
                warn!("Course {id} was not in the course table");
            }
            if !*no_cleanup {
                let mut events = EventBus::new();
                let cleanup = CourseCleanup::from_config(&config.opencast, store.clone())?;
                events.subscribe(std::sync::Arc::new(cleanup));
                events.publish(&CourseEvent::Deleted { course: id }).await;
            }
        }
        CourseCommand::List => {
            let courses = store.courses().await?;
            if courses.is_empty() {
                println!("No courses.");
            }
            for course in courses {
                bunt::println!(
                    "{[bold]}  {[cyan]}  {}",
                    format!("{:>6}", course.id),
                    course.shortname,
                    course.fullname,
                );
            }
        }
    }

    Ok(())
}
