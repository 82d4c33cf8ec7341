pub mod instance;
pub mod signal;
