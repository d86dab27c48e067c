//! Telegram Bot API notifier and transaction message formatting.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use ethers_core::utils::{format_ether, to_checksum};
use teloxide::prelude::*;
use teloxide::types::{ParseMode, Recipient};
use teloxide::utils::command::BotCommands;
use url::Url;

use crate::config::Chain;
use crate::models::{NotificationMessage, TransactionEvent};

pub const STARTUP_MESSAGE: &str = "🚀 Wallets are now being tracked";
pub const SHUTDOWN_MESSAGE: &str = "⚠️ Wallets have stopped being tracked";

#[derive(thiserror::Error, Debug)]
pub enum NotificationError {
    #[error("failed to build telegram client: {0}")]
    Client(String),
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
}

/// Delivers a message. Failures are logged by the implementation and
/// reported as `false`; nothing is retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &NotificationMessage) -> bool;
}

/// Commands understood while discovering chat ids.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    Start,
}

#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(api_url: Url, token: impl Into<String>) -> Result<Self, NotificationError> {
        let client = teloxide::net::default_reqwest_settings()
            .no_proxy()
            .build()
            .map_err(|err| NotificationError::Client(err.to_string()))?;
        let bot = Bot::with_client(token, client).set_api_url(api_url);
        Ok(Self { bot })
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotificationError> {
        self.bot
            .send_message(recipient(chat_id), text)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    /// Tells a chat its own id.
    pub async fn reply_chat_id(&self, chat_id: i64) -> Result<(), NotificationError> {
        answer_chat_id(&self.bot, ChatId(chat_id)).await
    }

    /// Answers every `/start` message received within `duration` with the
    /// sender's chat id and returns the ids seen.
    pub async fn discover_chat_ids(&self, duration: Duration) -> Result<Vec<i64>, NotificationError> {
        let me = self.bot.get_me().await?;
        tracing::info!("listening for /start messages to @{}", me.username());

        let found: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&found);
        let handler = Update::filter_message().filter_command::<Command>().endpoint(
            move |bot: Bot, msg: Message, cmd: Command| {
                let seen = Arc::clone(&seen);
                async move {
                    match cmd {
                        Command::Start => {
                            tracing::info!(
                                "chat {} ({}) requested its id",
                                msg.chat.id.0,
                                msg.chat
                                    .title()
                                    .or(msg.chat.username())
                                    .unwrap_or("private")
                            );
                            answer_chat_id(&bot, msg.chat.id).await?;
                            record_chat_id(&seen, msg.chat.id.0);
                        }
                    }
                    Ok::<(), NotificationError>(())
                }
            },
        );

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler).build();
        if tokio::time::timeout(duration, dispatcher.dispatch()).await.is_ok() {
            tracing::warn!("telegram dispatcher stopped before the discovery window ended");
        }

        let ids = found.lock().unwrap_or_else(PoisonError::into_inner).clone();
        Ok(ids)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &NotificationMessage) -> bool {
        match self.send_message(&message.chat_id, &message.text).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!("failed to send telegram message: {}", err);
                false
            }
        }
    }
}

async fn answer_chat_id(bot: &Bot, chat_id: ChatId) -> Result<(), NotificationError> {
    bot.send_message(chat_id, format!("Your Chat ID is: {}", chat_id.0))
        .await?;
    Ok(())
}

fn record_chat_id(found: &Mutex<Vec<i64>>, id: i64) {
    let mut found = found.lock().unwrap_or_else(PoisonError::into_inner);
    if !found.contains(&id) {
        found.push(id);
    }
}

/// Numeric ids go out as integers, anything else as a `@channel` name.
fn recipient(chat_id: &str) -> Recipient {
    match chat_id.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(chat_id.to_string()),
    }
}

pub fn format_transaction_message(chain: Chain, event: &TransactionEvent) -> String {
    let hash = event.hash_hex();
    let to = event
        .to
        .map(|to| format!("<code>{}</code>", to_checksum(&to, None)))
        .unwrap_or_else(|| "Contract Creation".to_string());

    let mut msg = format!(
        "🚨 <b>{} Wallet Transaction Detected</b> 🚨\n\
         📊 Block: {}\n\
         💸 From: <code>{}</code>\n\
         💰 To: {}\n\
         💵 Value: {} {}\n\
         🔗 Tx Hash: <code>{}</code>\n\
         🌐 Explorer: {}{}",
        chain.name(),
        event.block_number,
        to_checksum(&event.from, None),
        to,
        format_eth_value(event),
        chain.native_symbol(),
        hash,
        chain.explorer_tx_url(),
        hash,
    );

    if let Some(at) = chrono::DateTime::from_timestamp(event.timestamp as i64, 0) {
        msg.push_str(&format!("\n⏰ {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }

    msg
}

fn format_eth_value(event: &TransactionEvent) -> String {
    let formatted = format_ether(event.value_wei);
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}
