//! Telegram transport for wmbot.
//!
//! [`TelegramAdapter`] long-polls the Bot API and feeds every message to the
//! pipeline [`Dispatcher`](wmbot_pipeline::Dispatcher); [`BotTransfer`]
//! implements the pipeline's transfer and notification traits on top of the
//! same `Bot`.

pub mod activity;
pub mod adapter;
pub mod error;
pub mod handler;
pub mod transfer;

pub use adapter::TelegramAdapter;
pub use error::TelegramError;
pub use transfer::BotTransfer;
