//! This module defines the command line arguments coursecast accepts.

use std::path::PathBuf;
use termcolor::ColorChoice;

use crate::{cmd, db::cmd::DbCommand};


#[derive(Debug, clap::Parser)]
#[clap(about = "Course integration service for Opencast.")]
pub(crate) struct Args {
    #[clap(subcommand)]
    pub(crate) cmd: Command,

    /// Whether to use colors and other ANSI codes in the output. Possible
    /// values: 'always', 'auto', 'never'.
    #[clap(long, global = true, default_value = "auto", value_parser = parse_color_choice)]
    pub(crate) color: ColorChoice,
}

#[derive(Debug, clap::Subcommand)]
pub(crate) enum Command {
    /// Starts the HTTP server that receives course events, form submissions
    /// and LTI launch requests.
    Serve {
        #[clap(flatten)]
        shared: Shared,
    },

    /// Runs the course deletion cleanup for the given courses: videos of
    /// series no longer used by any surviving course are deleted in Opencast.
    Cleanup {
        #[clap(flatten)]
        args: cmd::cleanup::Args,

        #[clap(flatten)]
        shared: Shared,
    },

    /// Manage the local course mirror.
    Course {
        #[clap(subcommand)]
        cmd: cmd::course::CourseCommand,

        #[clap(flatten)]
        shared: Shared,
    },

    /// Manage course <-> series mappings.
    Mapping {
        #[clap(subcommand)]
        cmd: cmd::mapping::MappingCommand,

        #[clap(flatten)]
        shared: Shared,
    },

    /// Database operations.
    Db {
        #[clap(subcommand)]
        cmd: DbCommand,

        #[clap(flatten)]
        shared: Shared,
    },

    /// Inspect or clean the file trash directory.
    Trash {
        #[clap(subcommand)]
        cmd: cmd::trash::TrashCommand,

        #[clap(flatten)]
        shared: Shared,
    },

    /// Prints signed LTI launch parameters for an Opencast tool. Useful to
    /// debug LTI configuration.
    LtiLaunch {
        #[clap(flatten)]
        args: cmd::lti_launch::Args,

        #[clap(flatten)]
        shared: Shared,
    },

    /// Checks config, DB connection and the connection to all Opencast
    /// instances.
    ///
    /// Exits with 0 if everything is Ok, and with 1 otherwise.
    Check {
        #[clap(flatten)]
        shared: Shared,
    },

    /// Outputs a template for the configuration file (which includes
    /// descriptions or all options).
    WriteConfig {
        /// Target file. If not specified, the template is written to stdout.
        target: Option<PathBuf>,
    },
}

impl Command {
    /// Name used for the `${cmd}` placeholder of the log file path.
    pub(crate) fn log_name(&self) -> &'static str {
        match self {
            Self::Serve { .. } => "serve",
            Self::Cleanup { .. } => "cleanup",
            _ => "other",
        }
    }
}

#[derive(Debug, clap::Args)]
pub(crate) struct Shared {
    /// Path to the configuration file. If this is not specified, coursecast
    /// will try opening `config.toml` or `/etc/coursecast/config.toml`.
    #[clap(short, long)]
    pub(crate) config: Option<PathBuf>,
}

impl Args {
    pub(crate) fn stdout_color(&self) -> ColorChoice {
        adjust_color_choice(self.color, std::io::IsTerminal::is_terminal(&std::io::stdout()))
    }

    pub(crate) fn stderr_color(&self) -> ColorChoice {
        adjust_color_choice(self.color, std::io::IsTerminal::is_terminal(&std::io::stderr()))
    }
}

fn adjust_color_choice(choice: ColorChoice, is_terminal: bool) -> ColorChoice {
    match choice {
        ColorChoice::Auto if !is_terminal => ColorChoice::Never,
        other => other,
    }
}

fn parse_color_choice(s: &str) -> Result<ColorChoice, String> {
    match s {
        "always" => Ok(ColorChoice::Always),
        "auto" => Ok(ColorChoice::Auto),
        "never" => Ok(ColorChoice::Never),
        other => Err(format!("invalid color choice '{other}'")),
    }
}
