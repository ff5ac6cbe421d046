pub mod audit;
pub mod migrate;
pub mod save;
