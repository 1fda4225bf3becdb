pub mod parse;
pub mod pull;
