use std::fmt::Display;

use colored::{Color, Colorize};
use log::{Level, SetLoggerError};

/// External crates only need to log warnings and errors
const EXTERNAL_LEVELS: [Level; 2] = [Level::Warn, Level::Error];
const LOCAL_LEVELS: [Level; 3] = [Level::Info, Level::Warn, Level::Error];

pub struct LogColor;

impl LogColor {
    pub const RED: Color = Color::Red;
    pub const DIMMED: Color = Color::BrightBlack;
}

pub fn init_logger() -> Result<(), SetLoggerError> {
    fern::Dispatch::new()
        .format(move |out, message, record| {
            let target = Target::from_module(record.target());
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {:^8} {}",
                level_badge(record.level()),
                now.format("%H:%M:%S").to_string().bright_black(),
                target,
                message
            ))
        })
        .filter(|meta| {
            let target = Target::from_module(meta.target());

            if target.is_local() {
                LOCAL_LEVELS.contains(&meta.level())
            } else {
                EXTERNAL_LEVELS.contains(&meta.level())
            }
        })
        .chain(std::io::stdout())
        .apply()
}

enum Target {
    External(String),
    App,
    Server,
    Collab,
    Core,
}

impl Target {
    fn from_module(path: &str) -> Self {
        let root = path.split("::").next().unwrap_or(path);

        match root {
            "musicroom" => Self::App,
            "musicroom_core" => Self::Core,
            "musicroom_server" => Self::Server,
            "musicroom_collab" => Self::Collab,
            other => Self::External(other.to_string()),
        }
    }

    fn is_local(&self) -> bool {
        !matches!(self, Self::External(_))
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Target::External(x) => x.as_str().clear(),
            Target::App => "ROOM".bright_cyan(),
            Target::Server => "SERVER".bright_green(),
            Target::Collab => "COLLAB".bright_purple(),
            Target::Core => "CORE".blue(),
        };

        Display::fmt(&label, f)
    }
}

fn level_badge(level: Level) -> String {
    match level {
        Level::Error => " ERR ".black().on_red().bold().to_string(),
        Level::Warn => " WRN ".black().on_yellow().bold().to_string(),
        Level::Info => " INF ".black().on_blue().bold().to_string(),
        Level::Debug => " DBG ".white().on_black().to_string(),
        Level::Trace => " TRC ".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_map_to_crates() {
        assert!(matches!(
            Target::from_module("musicroom_collab::rooms::playback"),
            Target::Collab
        ));
        assert!(matches!(Target::from_module("musicroom"), Target::App));
        assert!(matches!(
            Target::from_module("sqlx::query"),
            Target::External(name) if name == "sqlx"
        ));
    }
}
