pub mod adapter;
pub mod card_rail;
pub mod error;
pub mod http;
pub mod mobile_money;
pub mod sandbox;
pub mod types;
