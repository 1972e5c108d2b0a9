//! Chat client: the message-delivery pipeline and the conversation session on top of it.
//!
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod connectivity;
pub mod core;
pub mod dispatch;
pub mod gate;
pub mod policy;
pub mod session;
pub mod types;

pub use builder::ChatClientBuilder;
pub use connectivity::{
    AlwaysOnline, AtomicOnlineFlag, Connectivity, ConnectivityProber, HttpReachability, OnlineFlag,
    Reachability,
};
pub use core::ChatClient;
pub use dispatch::{parse_single_shot, Dispatched, Dispatcher};
pub use gate::{ClientSlot, RemoteClientGate, SharedBackend};
pub use policy::{ErrorClass, ErrorClassifier};
pub use session::{ChatSession, Notice, SendFailure};
pub use types::{ReplyStream, ReplyUpdate, SendStats};
