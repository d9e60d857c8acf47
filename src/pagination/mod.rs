pub mod page;
pub mod reader;
