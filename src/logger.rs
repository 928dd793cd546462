use std::{
    collections::HashMap,
    fmt::Write as _,
    fs::OpenOptions,
    path::{Path, PathBuf},
};
use nu_ansi_term::{Color, Style};
use serde::Deserialize;
use termcolor::ColorChoice;
use tracing::{field::{Field, Visit}, Level};
use tracing_log::NormalizeEvent;
use tracing_subscriber::{
    filter::{FilterFn, LevelFilter},
    fmt::FormatEvent,
    prelude::*,
};

use crate::{prelude::*, args::Args};


#[derive(Debug, confique::Config)]
pub(crate) struct LogConfig {
    /// Which log messages to emit, by target prefix and minimum level.
    ///
    /// For each message, the entry with the longest prefix of the message's
    /// target (usually the module path) is used. Messages without matching
    /// entry are dropped. Example: everything from this service at "info",
    /// the cleanup cascade at "trace" and the HTTP library at "debug":
    ///
    ///    [log]
    ///    filters.coursecast = "info"
    ///    filters."coursecast::cleanup" = "trace"
    ///    filters.hyper = "debug"
    #[config(default = { "coursecast": "debug" })]
    pub(crate) filters: Filters,

    /// If set, log messages are also appended to this file. `${cmd}` is
    /// replaced by the subcommand: `serve`, `cleanup` or `other`.
    /// Example: "/var/log/coursecast-${cmd}.log".
    pub(crate) file: Option<PathBuf>,

    /// Set to `false` to not log to stdout.
    #[config(default = true)]
    pub(crate) stdout: bool,

    /// If `true`, the headers of each incoming HTTP request are logged
    /// with level "trace".
    #[config(default = false)]
    pub(crate) log_http_headers: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "HashMap<String, String>")]
pub(crate) struct Filters(HashMap<String, LevelFilter>);

impl TryFrom<HashMap<String, String>> for Filters {
    type Error = String;
    fn try_from(value: HashMap<String, String>) -> Result<Self, Self::Error> {
        value.into_iter()
            .map(|(prefix, level)| Ok((prefix, parse_level_filter(&level)?)))
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

impl Filters {
    fn enabled(&self, target: &str, level: &Level) -> bool {
        self.0.iter()
            .filter(|(prefix, _)| target.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .is_some_and(|(_, filter)| level <= filter)
    }

    fn max_level(&self) -> LevelFilter {
        self.0.values().max().copied().unwrap_or(LevelFilter::OFF)
    }
}

fn parse_level_filter(s: &str) -> Result<LevelFilter, String> {
    match s {
        "off" => Ok(LevelFilter::OFF),
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        other => Err(format!("invalid log level '{other}'")),
    }
}

/// Installs our logger globally. Must only be called once!
pub(crate) fn init(config: &LogConfig, args: &Args, cmd: &str) -> Result<()> {
    let filters = config.filters.clone();
    let max_level = filters.max_level();
    let filter = FilterFn::new(move |metadata| filters.enabled(metadata.target(), metadata.level()))
        .with_max_level_hint(max_level);

    let stdout_output = config.stdout.then(|| {
        tracing_subscriber::fmt::layer()
            .event_format(EventFormatter(args.color))
            .with_writer(std::io::stdout)
    });

    let file_output = config.file.as_ref()
        .map(|path| open_log_file(path, cmd))
        .transpose()?
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .event_format(EventFormatter(args.color))
                .with_writer(file)
                .with_ansi(args.color == ColorChoice::Always)
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_output)
        .with(stdout_output)
        .init();

    Ok(())
}

fn open_log_file(path: &Path, cmd: &str) -> Result<std::fs::File> {
    use std::io::Write;

    let path = path.to_str()
        .ok_or_else(|| anyhow!("log file path is not valid UTF-8"))?
        .replace("${cmd}", cmd);

    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&path)
        .with_context(|| format!("failed to open/create log file '{path}'"))?;

    // Empty line to make process restarts visible.
    file.write_all(b"\n").context("could not write to log file")?;

    Ok(file)
}


type TracingWriter<'a> = tracing_subscriber::fmt::format::Writer<'a>;

/// Formats as `<time> <LEVEL> <target> >  <message> ~~ key=value key=value`.
#[derive(Clone, Copy)]
struct EventFormatter(ColorChoice);

impl<S, N> FormatEvent<S, N> for EventFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: TracingWriter<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let use_ansi = self.0 == ColorChoice::Always
            || (writer.has_ansi_escapes() && self.0 != ColorChoice::Never);
        let paint = |style: Style, s: &str| -> String {
            if use_ansi { style.paint(s).to_string() } else { s.to_owned() }
        };

        // Events coming from the `log` crate carry their real metadata in fields.
        let normalized = event.normalized_metadata();
        let metadata = normalized.as_ref().unwrap_or(event.metadata());

        let (level_style, body_style) = styles(metadata.level());
        let dim = Style::new().dimmed();

        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        write!(writer, "{} ", paint(dim, &now))?;
        write!(writer, "{}", paint(level_style, &format!("{:5}", metadata.level())))?;
        write!(writer, "{}", paint(dim, &format!(" {} >  ", metadata.target())))?;

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        // Continuation lines of multi-line messages are aligned with the first.
        let indent = format!(
            "\n{:width$}{}  ",
            "",
            paint(dim, ">"),
            width = "2021-05-04 19:40:18.270 DEBUG ".len() + 1 + metadata.target().len(),
        );
        if let Some(message) = &fields.message {
            let body = message.lines()
                .map(|line| paint(body_style, line))
                .collect::<Vec<_>>()
                .join(&indent);
            write!(writer, "{body}")?;
        }

        if !fields.pairs.is_empty() {
            if fields.message.is_some() {
                write!(writer, "{}", paint(level_style, " ~~ "))?;
            }
            let pairs = fields.pairs.iter()
                .map(|(key, value)| {
                    format!("{}{}", paint(body_style.italic(), key), paint(body_style, &format!("={value}")))
                })
                .collect::<Vec<_>>()
                .join(" ");
            write!(writer, "{pairs}")?;
        }

        writeln!(writer)
    }
}

fn styles(level: &Level) -> (Style, Style) {
    match *level {
        Level::ERROR => (Style::new().fg(Color::Red).bold(), Style::new().fg(Color::Red)),
        Level::WARN => (Style::new().fg(Color::Yellow).bold(), Style::new().fg(Color::Yellow)),
        Level::INFO => (Style::new().fg(Color::Green), Style::new()),
        Level::DEBUG => (Style::new().fg(Color::Blue), Style::new().dimmed()),
        Level::TRACE => (Style::new().fg(Color::Magenta), Style::new().fg(Color::DarkGray)),
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    pairs: Vec<(&'static str, String)>,
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = Some(format!("{value:?}")),
            name if name.starts_with("log.") => {}
            name => {
                let mut buf = String::new();
                let _ = write!(buf, "{value:?}");
                self.pairs.push((name, buf));
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use tracing::Level;

    use super::{parse_level_filter, Filters};

    fn filters(entries: &[(&str, &str)]) -> Filters {
        let map = entries.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Filters::try_from(map).unwrap()
    }

    #[test]
    fn level_names() {
        assert!(parse_level_filter("trace").is_ok());
        assert!(parse_level_filter("off").is_ok());
        assert!(parse_level_filter("verbose").is_err());
        assert!(parse_level_filter("INFO").is_err());
    }

    #[test]
    fn longest_prefix_wins() {
        let f = filters(&[
            ("coursecast", "info"),
            ("coursecast::cleanup", "trace"),
            ("coursecast::db", "off"),
        ]);

        assert!(f.enabled("coursecast::http", &Level::INFO));
        assert!(!f.enabled("coursecast::http", &Level::DEBUG));
        assert!(f.enabled("coursecast::cleanup", &Level::TRACE));
        assert!(!f.enabled("coursecast::db::mapping", &Level::ERROR));
        assert!(!f.enabled("hyper::proto", &Level::ERROR));
    }

    #[test]
    fn invalid_level_rejected() {
        let map = HashMap::from([("coursecast".to_string(), "loud".to_string())]);
        assert!(Filters::try_from(map).is_err());
    }
}
