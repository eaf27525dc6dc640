pub mod config;
pub mod dataset;
pub mod pose_store;

// Pose classification
pub mod classifier;
pub mod softmax;

// Session orchestration
pub mod session;
pub mod session_runner;
