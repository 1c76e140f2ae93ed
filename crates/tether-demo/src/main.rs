//! `tether-demo`: narrates ownership handle lifecycles on the console.
//!
//! Each scenario creates resources that announce their construction and
//! destruction, then walks handles through copies, resets, locks and drops
//! while printing the counts.
//!
//! ```text
//! tether-demo shared
//! tether-demo --log-level trace cycle
//! TETHER_LOG=debug tether-demo all
//! ```

mod scenarios;

use clap::{Parser, ValueEnum};
use std::process::ExitCode;
use tether_log::{Level, error, warn};

/// Walk through shared, weak and unique ownership scenarios.
#[derive(Debug, Parser)]
#[command(name = "tether-demo", version, about)]
struct Cli {
    /// Minimum log level (error, warn, info, debug, trace). Overrides TETHER_LOG.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<Level>,

    /// Disable ANSI colors.
    #[arg(long)]
    no_color: bool,

    /// Scenario to run.
    #[arg(value_enum, default_value_t = Scenario::All)]
    scenario: Scenario,
}

/// The scenarios the demo can narrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Copies of a strong handle and the deleter on the last drop.
    Shared,
    /// A weak observer outliving its resource.
    Weak,
    /// Two entities linked with one weak back-edge.
    Cycle,
    /// Two entities linked strongly in both directions.
    Leak,
    /// Custom deleters on shared and unique handles.
    Deleter,
    /// Exclusive ownership and transfer between unique handles.
    Unique,
    /// Taking ownership out of a handle without touching counts.
    Take,
    /// Clones dropped from several threads.
    Threads,
    /// Every scenario in order.
    All,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tether_log::set_color_enabled(!cli.no_color);
    if let Err(err) = tether_log::init_from_env() {
        warn!("ignoring {}: {}", tether_log::LOG_ENV, err);
    }
    if let Some(level) = cli.log_level {
        tether_log::set_level(level);
    }

    match scenarios::run(cli.scenario) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("scenario {:?} failed: {}", cli.scenario, err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["tether-demo"]).unwrap();

        assert_eq!(cli.scenario, Scenario::All);
        assert_eq!(cli.log_level, None);
        assert!(!cli.no_color);
    }

    #[test]
    fn test_parse_flags() {
        let cli =
            Cli::try_parse_from(["tether-demo", "--log-level", "trace", "--no-color", "cycle"])
                .unwrap();

        assert_eq!(cli.scenario, Scenario::Cycle);
        assert_eq!(cli.log_level, Some(Level::Trace));
        assert!(cli.no_color);
    }

    #[test]
    fn test_parse_rejects_unknown_level() {
        assert!(Cli::try_parse_from(["tether-demo", "--log-level", "loud"]).is_err());
    }
}
