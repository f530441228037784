//! Command-line interface definitions and parsing

use arvi_core::LaunchOptions;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Application key, overriding the configuration file
    #[arg(short = 'k', long)]
    pub app_key: Option<String>,

    /// Run against the in-memory platform instead of the plugin
    #[arg(short, long)]
    pub simulate: bool,

    /// Run in trial mode regardless of what the platform reports
    #[arg(long)]
    pub trial: bool,

    /// Never track cord twisting
    #[arg(long)]
    pub disable_cord_twist_tracking: bool,
}

impl Cli {
    /// Parse the process arguments, accepting the platform's launch flags
    ///
    /// The platform launches applications with single-dash flags such as
    /// `-trial`, which clap would read as bundled short options. Those are
    /// taken out and parsed separately; the rest goes through clap.
    pub fn parse_with_launch_flags<I, S>(args: I) -> Result<(Self, LaunchOptions), clap::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut platform = Vec::new();
        let mut rest = Vec::new();
        for (index, arg) in args.into_iter().map(Into::into).enumerate() {
            if index > 0 && LaunchOptions::is_launch_flag(&arg) {
                platform.push(arg);
            } else {
                rest.push(arg);
            }
        }
        let cli = Self::try_parse_from(rest)?;
        Ok((cli, LaunchOptions::from_args(platform)))
    }

    /// Launch options requested through the double-dash flags
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            force_trial_mode: self.trial,
            disable_cord_twist_tracking: self.disable_cord_twist_tracking,
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Print platform and session information as JSON
    Info,
    /// Check whether the application is entitled to run
    Entitlement {
        /// Give up after this many milliseconds
        #[arg(short, long, default_value_t = 5000)]
        timeout_ms: u64,
    },
    /// Drive the tick loop, answering platform messages
    Run {
        /// Stop after this many ticks (runs until Ctrl-C when omitted)
        #[arg(short = 'n', long)]
        ticks: Option<u64>,
        /// Milliseconds between ticks
        #[arg(long, default_value_t = 16)]
        tick_ms: u64,
        /// Session length in seconds reported through TIMELEFT
        #[arg(long)]
        time_left: Option<i32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_flags_are_accepted_in_any_case() {
        let (cli, launch) =
            Cli::parse_with_launch_flags(["arvi-host", "-TRIAL", "--simulate", "info"]).unwrap();
        assert!(launch.force_trial_mode);
        assert!(!launch.disable_cord_twist_tracking);
        assert!(cli.simulate);
        assert_eq!(cli.command, Commands::Info);

        let (_, launch) =
            Cli::parse_with_launch_flags(["arvi-host", "info", "-DisableCordTwistTracking"]).unwrap();
        assert!(launch.disable_cord_twist_tracking);
    }

    #[test]
    fn test_double_dash_flags_still_parse() {
        let (cli, launch) =
            Cli::parse_with_launch_flags(["arvi-host", "--trial", "run", "-n", "3"]).unwrap();
        assert_eq!(launch, LaunchOptions::default());
        assert!(cli.launch_options().force_trial_mode);
        assert_eq!(
            cli.command,
            Commands::Run {
                ticks: Some(3),
                tick_ms: 16,
                time_left: None
            }
        );
    }

    #[test]
    fn test_other_single_dash_arguments_reach_clap() {
        assert!(Cli::parse_with_launch_flags(["arvi-host", "-bogus", "info"]).is_err());
    }
}
