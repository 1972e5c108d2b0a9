//! # Types Module
//!
//! Core data types shared by the store, the dispatcher and the stream decoder.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Transcript entry (user or AI) |
//! | [`Transcript`] | Ordered message history with replace-by-id updates |
//! | [`CompletionRequest`] | Body of the remote completion call |
//! | [`StreamFrame`] | One decoded `data:` event |
//! | [`StreamSignal`] | Text / completion / failure signal emitted by the line decoder |

pub mod events;
pub mod message;

pub use events::{CompletionRequest, CompletionResponse, StreamFrame, StreamSignal};
pub use message::{format_message_time, Message, Sender, Transcript};
