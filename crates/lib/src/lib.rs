//! wabridge core library: relays WhatsApp messages received from the messaging provider to a
//! generative model and sends the model's reply back to the sender.

pub mod auth;
pub mod channels;
pub mod config;
pub mod gateway;
pub mod llm;
