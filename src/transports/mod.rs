//! Shipped [`Transport`](crate::transport::Transport) implementations

pub mod channel;
pub mod replay;

pub use channel::{ChannelHandle, ChannelTransport};
pub use replay::ReplayTransport;
