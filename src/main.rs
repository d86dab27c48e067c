mod cli;

use std::time::Duration;

use anyhow::{ensure, Context};
use clap::Parser;
use eth_wallet_notifier::config::{self, Config};
use eth_wallet_notifier::eth::EthClient;
use eth_wallet_notifier::models::NotificationMessage;
use eth_wallet_notifier::scheduler::Scheduler;
use eth_wallet_notifier::telegram::{
    format_transaction_message, Notifier, TelegramNotifier, SHUTDOWN_MESSAGE, STARTUP_MESSAGE,
};
use eth_wallet_notifier::watcher::WalletWatcher;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { interval_secs } => {
            let config = Config::from_env().context("failed to load configuration")?;
            run(config, interval_secs).await?;
        }
        Commands::PollOnce { blocks, notify } => {
            let config = Config::from_env().context("failed to load configuration")?;
            poll_once(config, blocks, notify).await?;
        }
        Commands::ChatId { timeout_secs } => {
            chat_id(timeout_secs).await?;
        }
    }

    Ok(())
}

async fn run(mut config: Config, interval_secs: Option<u64>) -> anyhow::Result<()> {
    if let Some(secs) = interval_secs {
        ensure!(secs > 0, "--interval-secs must be greater than zero");
        config.poll_interval = Duration::from_secs(secs);
    }

    let client = EthClient::new(&config.rpc_url, config.rpc_timeout)?;
    let (chain_id, head) = client
        .startup_check()
        .await
        .context("initial RPC connection failed")?;
    tracing::info!(
        "connected to {} (chain id {}), head block {}",
        config.chain,
        chain_id,
        head
    );

    let notifier = TelegramNotifier::new(config.telegram_api_url.clone(), &config.telegram_bot_token)?;
    let watcher = WalletWatcher::start(
        client,
        &config.wallets,
        config.start_block,
        config.max_blocks_per_poll,
    )
    .await
    .context("initial RPC connection failed")?;
    tracing::info!("tracking wallets: {}", config.wallet_checksums().join(", "));

    send_text(&notifier, &config.telegram_chat_id, STARTUP_MESSAGE).await;

    let mut scheduler = Scheduler::new(
        watcher,
        notifier,
        config.chain,
        config.telegram_chat_id.clone(),
        config.poll_interval,
    );
    scheduler.run_until(shutdown_signal()).await;

    send_text(scheduler.notifier(), &config.telegram_chat_id, SHUTDOWN_MESSAGE).await;
    Ok(())
}

async fn poll_once(config: Config, blocks: u64, notify: bool) -> anyhow::Result<()> {
    ensure!(blocks > 0, "--blocks must be greater than zero");

    let client = EthClient::new(&config.rpc_url, config.rpc_timeout)?;
    let (_, head) = client
        .startup_check()
        .await
        .context("initial RPC connection failed")?;
    let start = head.saturating_sub(blocks - 1);

    let mut watcher = WalletWatcher::start(
        client,
        &config.wallets,
        Some(start),
        config.max_blocks_per_poll.max(blocks),
    )
    .await
    .context("initial RPC connection failed")?;
    let events = watcher.poll().await;

    let notifier = if notify {
        Some(TelegramNotifier::new(
            config.telegram_api_url.clone(),
            &config.telegram_bot_token,
        )?)
    } else {
        None
    };

    if events.is_empty() {
        println!("no transactions for tracked wallets since block {}", start);
    }
    for event in &events {
        let text = format_transaction_message(config.chain, event);
        println!("{}\n", text);
        if let Some(notifier) = &notifier {
            send_text(notifier, &config.telegram_chat_id, &text).await;
        }
    }

    Ok(())
}

async fn chat_id(timeout_secs: u64) -> anyhow::Result<()> {
    let (token, api_base) =
        config::telegram_from_env().context("failed to load telegram configuration")?;
    let notifier = TelegramNotifier::new(api_base, token)?;

    println!(
        "Bot is running. Send /start to it within {}s to get your chat id.",
        timeout_secs
    );
    let ids = notifier
        .discover_chat_ids(Duration::from_secs(timeout_secs))
        .await
        .context("failed to read telegram updates")?;

    if ids.is_empty() {
        println!("no /start messages received");
    }
    for id in ids {
        println!("TELEGRAM_CHAT_ID={}", id);
    }
    Ok(())
}

async fn send_text<N: Notifier>(notifier: &N, chat_id: &str, text: &str) {
    let message = NotificationMessage {
        chat_id: chat_id.to_string(),
        text: text.to_string(),
    };
    notifier.send(&message).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let Ok(mut term_signal) = signal(SignalKind::terminate()) else {
            std::future::pending::<()>().await;
            return;
        };
        term_signal.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}
