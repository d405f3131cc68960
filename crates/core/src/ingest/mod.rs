pub mod cbr;
pub mod error;
pub mod provider;
pub mod types;
pub mod xml;
