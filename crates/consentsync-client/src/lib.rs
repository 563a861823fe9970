//! Consentsync Client - Consent state machine and host observer bridge

pub mod bridge;
pub mod client;
pub mod observer;
pub mod surface;

pub use bridge::{ObserverBridge, Ticket};
pub use client::{ConsentClient, ConsentClientBuilder};
pub use observer::{Observer, ObserverHandle, ObserverSlot, SlotError, SlotWatch};
pub use surface::{NullSurface, Surface};
