//! Optional structured logging, initialized only when a caller opts in —
//! a library must not install a global subscriber unconditionally.
//!
//! Grounded on the teacher's `logger::init_logger`: a timestamped file
//! writer built with the `time` crate, wired into `tracing-subscriber`.
//! Differs from the teacher in two ways that matter for a library rather
//! than a CLI binary: it returns `anyhow::Result` instead of unwrapping,
//! and it is only ever called when `GameConfig`/`TournamentConfig`-driven
//! code explicitly asks for it.

use std::fs::File;
use std::path::{Path, PathBuf};

use time::format_description::{self, parse};
use time::OffsetDateTime;
use tracing::Level;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::FmtSubscriber;

/// Installs a global `tracing` subscriber that writes timestamped log
/// lines to a freshly created file under `directory`. Returns the path of
/// the file that was created.
///
/// # Errors
/// Fails if `directory` cannot be created, the log file cannot be opened,
/// or a global subscriber is already installed.
pub fn init(directory: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(directory.as_ref())?;
    let file_path = directory.as_ref().join(log_file_name());
    let file = File::create(&file_path)?;
    let writer = BoxMakeWriter::new(file);

    let local_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        local_offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")
            .expect("constant time format string is well-formed"),
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(writer)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("could not install tracing subscriber: {e}"))?;
    Ok(file_path)
}

fn log_file_name() -> String {
    let format = parse("[year]-[month]-[day]_[hour]-[minute]-[second]_deduction-arena.log")
        .expect("constant time format string is well-formed");
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&format).expect("OffsetDateTime::format never fails for a valid format")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_name_has_the_expected_suffix() {
        assert!(log_file_name().ends_with("_deduction-arena.log"));
    }
}
