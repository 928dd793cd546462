//! Prints a signed LTI launch, for debugging LTI setups without going
//! through the LMS.

use crate::{
    config::Config,
    lti::{self, LaunchContext, LtiRole, LtiSession, LtiUser},
    model::{Course, CourseId, InstanceId, SeriesId, VideoId},
    prelude::*,
};


#[derive(Debug, clap::Args)]
pub(crate) struct Args {
    /// Opencast instance ID. Defaults to the default instance.
    #[clap(long)]
    instance: Option<i32>,

    #[clap(long, default_value_t = 1)]
    course: i64,

    #[clap(long, default_value = "admin")]
    user: String,

    /// Launch as instructor instead of learner.
    #[clap(long)]
    instructor: bool,

    /// Custom tool to launch, e.g. `/ltitools/series/index.html`.
    #[clap(long, default_value = "")]
    tool: String,

    /// Launch Opencast Studio for uploading into this series.
    #[clap(long, conflicts_with_all = ["tool", "editor"])]
    studio: Option<String>,

    /// Launch the video editor for this video.
    #[clap(long, conflicts_with = "tool")]
    editor: Option<String>,

    #[clap(long)]
    locale: Option<String>,
}

pub(crate) fn run(args: &Args, config: &Config) -> Result<()> {
    let instance = match args.instance {
        Some(id) => config.opencast.instance(InstanceId(id))
            .ok_or_else(|| anyhow!("Opencast instance {id} is not configured"))?,
        None => config.opencast.default_instance()
            .ok_or_else(|| anyhow!("no Opencast instance configured"))?,
    };

    let tool = match (&args.studio, &args.editor) {
        (Some(series), _) => lti::studio_tool(&SeriesId(series.clone()), None),
        (_, Some(video)) => lti::editor_tool(&VideoId(video.clone())),
        _ => args.tool.clone(),
    };

    let context = LaunchContext {
        user: LtiUser {
            id: 0,
            username: args.user.clone(),
            firstname: String::new(),
            lastname: String::new(),
            email: None,
            role: if args.instructor { LtiRole::Instructor } else { LtiRole::Learner },
        },
        course: Course {
            id: CourseId(args.course),
            shortname: format!("course-{}", args.course),
            fullname: format!("Course {}", args.course),
        },
        session: LtiSession { locale: args.locale.clone() },
    };

    let launch = lti::build_launch_for(instance, &tool, &context, &config.general)?;
    bunt::println!("{$bold}POST{/$} {[cyan]}", launch.endpoint);
    for (key, value) in &launch.params {
        bunt::println!("  {[bold]} = {}", key, value);
    }

    Ok(())
}
