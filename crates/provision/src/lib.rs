#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Provisioning peer connectivity
//!
//! Maintains one outbound logical channel to a provisioning peer: the node
//! registers itself, publishes its plugin inventory, uploads backup
//! archives, and receives administrative commands. Commands are forwarded
//! to the daemon over an mpsc channel, never executed here. The transport
//! sits behind the [`ProvisioningChannel`] trait; the default
//! implementation speaks JSON over HTTP.

mod channel;
mod connector;
mod wire;

pub use channel::{HttpChannel, ProvisioningChannel};
pub use connector::{CommandReceiver, ProvisioningConnector};
pub use wire::{AdminCommand, InventoryReport, RegisterRequest, RegisterResponse};
