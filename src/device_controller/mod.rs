//! device management
//! - one actor per device, polling it and serializing its register io
//! - the manager building the actors from the settings
//! - periodic state reporting

pub mod device_manager;
pub mod workers;
