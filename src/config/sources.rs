//! Configuration sources, in override order.

pub mod environment;
pub mod project_file;
pub mod user_file;
