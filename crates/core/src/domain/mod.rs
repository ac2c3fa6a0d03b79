pub mod format;
pub mod portfolio;
pub mod quote;
pub mod recommendation;
pub mod user_data;
