pub mod error;
pub mod frames;
pub mod summary;
pub mod writer;
