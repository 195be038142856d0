mod capture;
mod probe;

pub use capture::{CaptureInvoker, CaptureRequest};
pub use probe::DeviceBusyProbe;
