use crate::{
    config::Config,
    model::{CourseId, InstanceId, SeriesId, SeriesMapping},
    prelude::*,
};


#[derive(Debug, clap::Subcommand)]
pub(crate) enum MappingCommand {
    /// Links a course to an Opencast series.
    Link {
        course: i64,
        series: String,

        /// Opencast instance ID. Defaults to the default instance.
        #[clap(long)]
        instance: Option<i32>,

        /// Make this the default series of the course on that instance.
        #[clap(long)]
        default: bool,
    },

    /// Removes a link between course and series. Does not touch Opencast.
    Unlink {
        course: i64,
        series: String,

        #[clap(long)]
        instance: Option<i32>,
    },

    /// Lists mappings, all or of one course.
    List {
        #[clap(long)]
        course: Option<i64>,
    },
}

pub(crate) async fn run(cmd: &MappingCommand, config: &Config) -> Result<()> {
    let store = super::connect_store(config).await?;
    let instance = |id: Option<i32>| -> Result<InstanceId> {
        match id {
            Some(id) => config.opencast.instance(InstanceId(id))
                .map(|i| i.id)
                .ok_or_else(|| anyhow!("Opencast instance {id} is not configured")),
            None => config.opencast.default_instance()
                .map(|i| i.id)
                .ok_or_else(|| anyhow!("no Opencast instance configured")),
        }
    };

    match cmd {
        MappingCommand::Link { course, series, instance: id, default } => {
            let mapping = SeriesMapping {
                course: CourseId(*course),
                instance: instance(*id)?,
                series: SeriesId(series.clone()),
                is_default: *default,
            };
            store.link(&mapping).await?;
            info!(
                "Linked course {} to series {} on instance {}",
                mapping.course, mapping.series, mapping.instance,
            );
        }
        MappingCommand::Unlink { course, series, instance: id } => {
            let (course, instance, series) = (CourseId(*course), instance(*id)?, SeriesId(series.clone()));
            if !store.unlink(course, instance, &series).await? {
                bail!("course {course} is not linked to series {series} on instance {instance}");
            }
            info!("Unlinked course {course} from series {series} on instance {instance}");
        }
        MappingCommand::List { course } => {
            let mappings = store.mappings(course.map(CourseId)).await?;
            if mappings.is_empty() {
                println!("No mappings.");
            }
            for m in mappings {
                let default = if m.is_default { " (default)" } else { "" };
                bunt::println!(
                    "course {[bold]}  instance {}  series {[cyan]}{[dimmed]}",
                    m.course,
                    m.instance,
                    m.series,
                    default,
                );
            }
        }
    }

    Ok(())
}
