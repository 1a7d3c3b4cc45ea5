use flexi_logger::{style, DeferredNow, FlexiLoggerError, LogSpecification, Logger, LoggerHandle};
use log::LevelFilter;
use std::io::Write;

/// Starts the stderr logger. The returned handle must stay alive for the
/// lifetime of the process.
pub fn init(verbosity: u8) -> Result<LoggerHandle, FlexiLoggerError> {
    let log_specification = LogSpecification::builder()
        .default(level_for(verbosity))
        .build();

    Logger::with(log_specification)
        .format(format_log_entry)
        .start()
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn format_log_entry(
    w: &mut dyn Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> std::io::Result<()> {
    let level = record.level();
    let t = now.now();
    write!(
        w,
        "[ {} ] {} {}",
        style(level).paint(level.to_string()),
        clock(t.hour(), t.minute(), t.second()),
        record.args()
    )
}

fn clock(hour: u8, minute: u8, second: u8) -> String {
    format!("{:02}:{:02}:{:02}", hour, minute, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_for(0), LevelFilter::Info);
        assert_eq!(level_for(1), LevelFilter::Debug);
        assert_eq!(level_for(2), LevelFilter::Trace);
        assert_eq!(level_for(7), LevelFilter::Trace);
    }

    #[test]
    fn clock_is_zero_padded() {
        assert_eq!(clock(9, 5, 3), "09:05:03");
        assert_eq!(clock(23, 59, 59), "23:59:59");
    }

    #[test]
    fn entry_carries_level_time_and_message() {
        let mut out = Vec::new();
        let mut now = DeferredNow::new();
        format_log_entry(
            &mut out,
            &mut now,
            &log::Record::builder()
                .level(log::Level::Warn)
                .args(format_args!("disk full"))
                .build(),
        )
        .unwrap();
        let line = String::from_utf8(out).unwrap();
        assert!(line.contains("WARN"));
        assert!(line.ends_with(" disk full"));
    }
}
