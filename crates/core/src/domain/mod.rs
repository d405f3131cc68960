pub mod contract;
pub mod rates;
