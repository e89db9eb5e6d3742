//! Transport module - the device-facing TCP listener.

mod tcp;

pub use tcp::{DeviceListener, DeviceStream};
