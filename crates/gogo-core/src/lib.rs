pub mod config;
pub mod conversation;
pub mod error;
pub mod proposal;
pub mod response;
pub mod schema;
pub mod text;

pub use error::*;
pub use proposal::*;
pub use response::*;
pub use text::*;
