use std::str::FromStr;

use anyhow::Result;
use tracing::Level;

use crate::config::LoggingConfig;

/// Install the stderr `fmt` subscriber.
///
/// `--verbose` forces `debug`; otherwise `[logging] level` decides.
/// Output goes to stderr so stdout stays parseable by scripts.
pub fn init(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        parse_level(&logging.level)?
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
    Ok(())
}

pub fn parse_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| anyhow::anyhow!("Unknown log level: '{}'", level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("warn").unwrap(), Level::WARN);
        assert_eq!(parse_level("DEBUG").unwrap(), Level::DEBUG);
        assert!(parse_level("loud").is_err());
    }
}
