pub mod backtest;
pub mod config;
pub mod data_ingestion;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod strategy;
