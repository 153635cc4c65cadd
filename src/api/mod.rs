pub mod chatbot;
mod error;
pub mod moods;
pub mod movies;
pub mod recommend;
pub mod system;

pub use error::{ApiError, ApiResult, ErrorBody};
