pub mod config;
pub mod credentials;
pub mod error;
pub mod error_utils;
pub mod posts_file;
pub mod types;

pub use config::*;
pub use credentials::*;
pub use error::*;
pub use error_utils::*;
pub use posts_file::parse_posts_file;
pub use types::*;
