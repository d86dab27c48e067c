use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "eth-wallet-notifier",
    version,
    about = "Telegram alerts for transactions touching tracked wallets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the chain on a fixed interval and send alerts until interrupted
    Run {
        /// Override POLL_INTERVAL_SECS
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Scan the last N blocks once and print what would be reported
    PollOnce {
        #[arg(long, default_value_t = 10)]
        blocks: u64,
        /// Also send the alerts to the configured chat
        #[arg(long)]
        notify: bool,
    },
    /// Reply to /start messages with the chat id, for filling TELEGRAM_CHAT_ID
    ChatId {
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_override() {
        let cli = Cli::parse_from(["eth-wallet-notifier", "run", "--interval-secs", "30"]);
        assert!(matches!(cli.command, Commands::Run { interval_secs: Some(30) }));
    }

    #[test]
    fn poll_once_defaults() {
        let cli = Cli::parse_from(["eth-wallet-notifier", "poll-once"]);
        assert!(matches!(
            cli.command,
            Commands::PollOnce { blocks: 10, notify: false }
        ));
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(Cli::try_parse_from(["eth-wallet-notifier", "serve"]).is_err());
    }
}
