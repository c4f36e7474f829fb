//! Workspace entry crate.
//!
//! Re-exports the [`core_service`] façade so a chat front end can depend on
//! `music-upload-bridge` alone and enable the documented features without
//! wiring each workspace crate individually.

pub use core_service::*;
