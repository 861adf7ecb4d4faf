//! Gateway: the webhook HTTP server and the relay pipeline behind it.
//!
//! `/inbound` runs validate → model reply → outbound send; `/status` only acknowledges.

mod relay;
mod server;

pub use relay::{PipelineError, Relay, APOLOGY_TEXT};
pub use server::{router, run_gateway, GatewayState};
