//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` + `Dispatcher` and drives the long-polling event loop
//! until Ctrl-C.

use teloxide::prelude::*;
use tracing::{info, warn};

use wmbot_core::config::TelegramConfig;
use wmbot_pipeline::Dispatcher as EventDispatcher;

use crate::error::TelegramError;
use crate::handler::handle_message;

/// Telegram channel adapter. Long polling, no public URL required.
pub struct TelegramAdapter {
    bot: Bot,
    events: EventDispatcher,
}

impl TelegramAdapter {
    pub fn new(bot: Bot, events: EventDispatcher) -> Self {
        Self { bot, events }
    }

    /// Build the `Bot` from config. The same bot is shared with
    /// [`crate::BotTransfer`].
    pub fn bot(config: &TelegramConfig) -> Result<Bot, TelegramError> {
        if config.bot_token.trim().is_empty() {
            return Err(TelegramError::NoToken);
        }
        Ok(Bot::new(&config.bot_token))
    }

    /// Drive the long-polling loop until Ctrl-C.
    ///
    /// Returns once the dispatcher stopped; pooled requests may still be
    /// running and should be drained by the caller.
    pub async fn run(self) {
        let events = match self.bot.get_me().await {
            Ok(me) => match me.user.username.clone() {
                Some(username) => {
                    info!(username = %username, "Telegram: connected");
                    self.events.with_bot_name(username)
                }
                None => self.events,
            },
            Err(e) => {
                warn!(error = %e, "Telegram: get_me failed, accepting commands for any bot");
                self.events
            }
        };

        info!("Telegram: starting long-polling dispatcher");

        let handler = Update::filter_message().endpoint(handle_message);

        Dispatcher::builder(self.bot, handler)
            .dependencies(dptree::deps![events])
            .default_handler(|_upd| async {})
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        info!("Telegram: dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_is_rejected() {
        let config = TelegramConfig {
            bot_token: "  ".into(),
        };
        assert!(matches!(
            TelegramAdapter::bot(&config),
            Err(TelegramError::NoToken)
        ));
    }

    #[test]
    fn token_builds_bot() {
        let config = TelegramConfig {
            bot_token: "123456:TEST".into(),
        };
        assert_eq!(TelegramAdapter::bot(&config).unwrap().token(), "123456:TEST");
    }
}
