pub mod provider;
pub mod refresh;
pub mod types;

pub use provider::{fetch_summaries, HttpJsonQuoteProvider, QuoteProvider};
