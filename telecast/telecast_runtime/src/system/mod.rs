//! System management for the Telecast runtime.
//!
//! This module provides the cooperative event loop, the signal bus, and
//! the phased startup sequencer.

pub mod eventloop;
pub mod signals;
pub mod startup;

// Re-export key types for convenience
pub use eventloop::EventLoop;
pub use signals::{SystemSignals, SystemSubscriber};
pub use startup::{StartupError, StartupSequencer};
