// Integrations with external devices and detectors

pub mod capture;
pub mod landmarks;
