use std::{
    collections::HashMap,
    fmt,
    fs::OpenOptions,
    path::PathBuf,
    sync::Arc,
};
use nu_ansi_term::{Color, Style};
use serde::Deserialize;
use tracing::{Level, field::Visit};
use tracing_log::NormalizeEvent;
use tracing_subscriber::{
    filter::{FilterFn, LevelFilter},
    fmt::FormatEvent,
    prelude::*,
};

use crate::prelude::*;


#[derive(Debug, confique::Config)]
pub(crate) struct LogConfig {
    /// Specifies what log messages to emit, based on the module path and log
    /// level.
    ///
    /// This is a map where the key specifies a module path prefix, and the
    /// value specifies a minimum log level. For each log message, the map
    /// entry with the longest prefix matching the log's module path is
    /// chosen. If no such entry exists, the log is not emitted. Otherwise,
    /// that entry's level is used to check whether the log message should be
    /// emitted.
    ///
    /// Example: only ≥"info" logs from Ladle generally, but ≥"trace" messages
    /// from the `db` submodule, and ≥"debug" from the HTTP library `hyper`:
    ///
    ///    [log]
    ///    filters.ladle = "info"
    ///    filters."ladle::db" = "trace"
    ///    filters.hyper = "debug"
    #[config(default = { "ladle": "debug" })]
    pub(crate) filters: Filters,

    /// If this is set, log messages are also written to this file.
    /// Example: "/var/log/ladle.log".
    pub(crate) file: Option<PathBuf>,

    /// If this is set to `false`, log messages are not written to stdout.
    #[config(default = true)]
    pub(crate) stdout: bool,
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "HashMap<String, String>")]
pub(crate) struct Filters(HashMap<String, LevelFilter>);

impl TryFrom<HashMap<String, String>> for Filters {
    type Error = String;
    fn try_from(value: HashMap<String, String>) -> Result<Self, Self::Error> {
        value.into_iter()
            .map(|(target_prefix, level)| {
                let level = parse_level_filter(&level)?;
                Ok((target_prefix, level))
            })
            .collect::<Result<_, _>>()
            .map(Self)
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

/// Installs our own logger globally. Must only be called once!
pub(crate) fn init(config: &LogConfig) -> Result<()> {
    // Forward `log` records from our dependencies into `tracing`.
    tracing_log::LogTracer::init().context("failed to install log forwarder")?;

    let filter = {
        let filters = config.filters.0.clone();
        let max_level = filters.values().max().copied().unwrap_or(LevelFilter::OFF);
        let filter = FilterFn::new(move |metadata| {
            // If there are many filters, it might be worth to build an extra
            // prefix data structure, but in practice we only expect very few
            // entries.
            //
            // See the config doc comment to see the logic behind this filter.
            filters.iter()
                .filter(|(target_prefix, _)| metadata.target().starts_with(*target_prefix))
                .max_by_key(|(target_prefix, _)| target_prefix.len())
                .map(|(_, level_filter)| metadata.level() <= level_filter)
                .unwrap_or(false)
        });
        filter.with_max_level_hint(max_level)
    };

    macro_rules! subscriber {
        ($writer:expr) => {
            tracing_subscriber::fmt::layer()
                .event_format(EventFormatter)
                .with_writer($writer)
        };
    }

    let stdout_output = if config.stdout {
        Some(subscriber!(std::io::stdout))
    } else {
        None
    };

    let file_output = config.file.as_ref()
        .map(|path| -> Result<_> {
            let file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(path)
                .with_context(|| format!("failed to open/create log file '{}'", path.display()))?;

            Ok(Arc::new(file))
        })
        .transpose()?
        .map(|file| subscriber!(file).with_ansi(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_output)
        .with(stdout_output)
        .init();

    Ok(())
}

type TracingWriter<'a> = tracing_subscriber::fmt::format::Writer<'a>;

struct EventFormatter;

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
        let use_ansi = writer.has_ansi_escapes();
        macro_rules! wr {
            ($style:expr, $fmt:literal $($args:tt)*) => {
                if use_ansi {
                    write!(writer, "{}", $style.paint(format!($fmt $($args)*)))?;
                } else {
                    write!(writer, $fmt $($args)*)?;
                }
            };
        }

        // Normalize metadata of events that originate from `log` records.
        let normalized_metadata = event.normalized_metadata();
        let metadata = normalized_metadata.as_ref().unwrap_or(event.metadata());

        let dim_style = Style::new().dimmed();
        let level_style = match *metadata.level() {
            Level::ERROR => Style::new().fg(Color::Red).bold(),
            Level::WARN => Style::new().fg(Color::Yellow).bold(),
            Level::INFO => Style::new().fg(Color::Green),
            Level::DEBUG => Style::new().fg(Color::Blue),
            Level::TRACE => Style::new().fg(Color::Magenta),
        };
        let body_style = match *metadata.level() {
            Level::ERROR => Style::new().fg(Color::Red),
            Level::WARN => Style::new().fg(Color::Yellow),
            Level::INFO => Style::new(),
            Level::DEBUG => Style::new().dimmed(),
            Level::TRACE => Style::new().fg(Color::DarkGray),
        };

        wr!(dim_style, "{} ", chrono::Local::now().format("%Y-%m-%d %H:%M:%S.%3f"));
        wr!(level_style, "{:5}", metadata.level());
        wr!(dim_style, " {} >  ", metadata.target());

        let mut visitor = MessageVisitor(None);
        event.record(&mut visitor);
        if let Some(message) = visitor.0 {
            wr!(body_style, "{}", message);
        }

        writeln!(writer)
    }
}

/// Extracts the `message` field of an event; all other fields are ignored.
struct MessageVisitor(Option<String>);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" && self.0.is_none() {
            self.0 = Some(format!("{value:?}"));
        }
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use tracing_subscriber::filter::LevelFilter;
    use super::{Filters, parse_level_filter};

    #[test]
    fn level_filters() {
        assert_eq!(parse_level_filter("off"), Ok(LevelFilter::OFF));
        assert_eq!(parse_level_filter("trace"), Ok(LevelFilter::TRACE));
        assert_eq!(parse_level_filter("warn"), Ok(LevelFilter::WARN));
        assert!(parse_level_filter("verbose").is_err());
        assert!(parse_level_filter("DEBUG").is_err());
    }

    #[test]
    fn filters_from_map() {
        let map = HashMap::from([
            ("ladle".to_owned(), "info".to_owned()),
            ("hyper".to_owned(), "debug".to_owned()),
        ]);
        let filters = Filters::try_from(map).unwrap();
        assert_eq!(filters.0["ladle"], LevelFilter::INFO);
        assert_eq!(filters.0["hyper"], LevelFilter::DEBUG);

        let bad = HashMap::from([("ladle".to_owned(), "loud".to_owned())]);
        assert!(Filters::try_from(bad).is_err());
    }
}
