//! Client-side session lifecycle for the Porchline chat widget.
//!
//! Three pieces, composed by [`LifecycleController`]:
//! - [`clock::SessionClock`] detects prolonged inactivity and signals at
//!   most once per idle period, with a shorter window while the page is
//!   hidden.
//! - [`delivery::ChannelSelector`] delivers the final transcript over the
//!   most reliable transport available in the current execution context.
//! - [`controller::LifecycleController`] owns the end-once guard and the
//!   transcript, and degrades failed turns to a fixed fallback reply.

pub mod client;
pub mod clock;
pub mod controller;
pub mod delivery;

pub use client::ChatClient;
pub use clock::{IdlePolicy, SessionClock, TimeoutKind};
pub use controller::LifecycleController;
pub use delivery::{
    BeaconDelivery, ChannelSelector, ConfirmedDelivery, EndReason, EndSessionPayload,
    TranscriptDelivery,
};
