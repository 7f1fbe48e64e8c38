//! ADAM-6200 series I/O modules
//! - codec: register words <-> engineering values
//! - channel: cached channel state
//! - variant: per-module register maps
//! - state: STANDBY / ON / FAULT
//! - poller: one polling cycle
//! - device: the engine tying them together
//! - attribute: `Role_i` attribute access

pub mod codec;
pub mod channel;
pub mod variant;
pub mod state;
pub mod poller;
pub mod device;
pub mod attribute;
