//! Messaging channel: inbound callback payloads and outbound delivery.
//!
//! Outbound delivery goes through a [`MessageTransport`]; two Vonage bindings are provided
//! (sandbox Basic auth and application JWT). [`OutboundSender`] wraps a transport and never
//! propagates delivery failures to the caller.

mod inbound;
mod status;
mod transport;
mod vonage;

pub use inbound::{sender_of, text_of, InboundMessage};
pub use status::StatusUpdate;
pub use transport::{MessageTransport, OutboundReply, OutboundSender, SendError, SendReceipt};
pub use vonage::{transport_from_config, ApplicationTransport, SandboxTransport};
