//! # ai-chat-client
//!
//! 单会话 AI 聊天客户端：消息投递流水线与本地会话记录。
//!
//! Single-conversation chat client library. Sends user text to a remote AI completion
//! endpoint, renders streamed replies incrementally and keeps a locally persisted
//! transcript consistent with what the user sees.
//!
//! ## Overview
//!
//! ```text
//! submit → probe → gate → dispatch (raced with timeout) ─┬─ single-shot parse ─┐
//!                                                         └─ stream decoder ────┴→ transcript
//!            ▲                                                                  │
//!            └──────────────── retry controller (on retryable failure) ◄────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_chat_client::{ChatClient, ChatSession, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> ai_chat_client::Result<()> {
//!     let mut config = ClientConfig::default();
//!     config.endpoint_url = Some("https://chat.example.com/api/complete".into());
//!
//!     let client = ChatClient::builder().config(config).build().await?;
//!     let mut session = ChatSession::load(client).await;
//!
//!     let mut print = |text: &str| -> anyhow::Result<()> {
//!         println!("{}", text);
//!         Ok(())
//!     };
//!     match session.submit("hello", Some(&mut print)).await {
//!         Ok(reply) => println!("{:?}", reply.map(|m| m.content)),
//!         Err(failure) => eprintln!("{}", failure.notice.text),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Prober, gate, dispatcher, retry policy, [`ChatClient`] and [`ChatSession`] |
//! | [`pipeline`] | Stream decoding, salvage of malformed events, retry controller |
//! | [`store`] | Key-value backends and the persisted [`TranscriptStore`] |
//! | [`transport`] | [`CompletionBackend`] seam and the reqwest-based [`HttpBackend`] |
//! | [`types`] | Messages, transcript and wire payloads |
//! | [`config`] | [`ClientConfig`] from YAML and `CHAT_*` environment variables |

pub mod client;
pub mod config;
pub mod pipeline;
pub mod store;
pub mod transport;
pub mod types;

pub use client::{
    ChatClient, ChatClientBuilder, ChatSession, ClientSlot, ErrorClassifier, Notice, ReplyStream,
    ReplyUpdate, SendFailure, SendStats,
};
pub use config::ClientConfig;
pub use pipeline::{RetryController, StreamDecoder, TextObserver};
pub use store::{FileStore, KeyValueStore, MemoryStore, TranscriptStore};
pub use transport::{CompletionBackend, HttpBackend, RemoteReply};
pub use types::{Message, Sender, Transcript};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
