pub mod backend;
pub mod error;
pub mod retry;
pub mod throttled;
