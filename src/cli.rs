use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use chatwatch::usecases::edit_rules::RuleTarget;

#[derive(Debug, Parser)]
#[command(name = "chatwatch", about = "Chat highlight/blacklist rules and channel watcher")]
pub struct Cli {
    /// Path to config file (default: ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show or edit highlight and blacklist rules
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
    /// Classify one message against the current rules
    Classify {
        #[arg(long, default_value = "local")]
        channel: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        text: String,
    },
    /// Stream `author: text` lines from stdin through the channel hub
    Watch { channel: String },
}

#[derive(Debug, Clone, Subcommand)]
pub enum RulesAction {
    /// List every rule
    List,
    /// Add a pattern
    Add {
        target: TargetArg,
        pattern: String,
        /// Match the pattern as a case-insensitive regex
        #[arg(long)]
        regex: bool,
    },
    /// Remove a pattern
    Remove { target: TargetArg, pattern: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetArg {
    Message,
    User,
    Blacklist,
}

impl From<TargetArg> for RuleTarget {
    fn from(value: TargetArg) -> Self {
        match value {
            TargetArg::Message => RuleTarget::Message,
            TargetArg::User => RuleTarget::User,
            TargetArg::Blacklist => RuleTarget::Blacklist,
        }
    }
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command.clone().unwrap_or(Command::Rules {
            action: RulesAction::List,
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn defaults_to_rule_listing_when_command_is_missing() {
        let cli = Cli::parse_from(["chatwatch"]);

        assert!(matches!(
            cli.command_or_default(),
            Command::Rules {
                action: RulesAction::List
            }
        ));
    }

    #[test]
    fn parses_rule_add_with_regex_flag() {
        let cli = Cli::parse_from([
            "chatwatch",
            "rules",
            "add",
            "user",
            "^mod",
            "--regex",
            "--config",
            "custom.toml",
        ]);

        match cli.command_or_default() {
            Command::Rules {
                action:
                    RulesAction::Add {
                        target,
                        pattern,
                        regex,
                    },
            } => {
                assert_eq!(target, TargetArg::User);
                assert_eq!(pattern, "^mod");
                assert!(regex);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(
            cli.config
                .as_deref()
                .map(|p| p.to_string_lossy().to_string()),
            Some("custom.toml".to_owned())
        );
    }

    #[test]
    fn parses_watch_channel() {
        let cli = Cli::parse_from(["chatwatch", "watch", "forsen"]);

        assert!(matches!(
            cli.command_or_default(),
            Command::Watch { channel } if channel == "forsen"
        ));
    }

    #[test]
    fn rejects_unknown_rule_target() {
        assert!(Cli::try_parse_from(["chatwatch", "rules", "add", "channel", "x"]).is_err());
    }
}
