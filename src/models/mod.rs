// Data models for frame capture, hand landmarks and labeled poses

pub mod capture;
pub mod hand;
pub mod pose;
