pub mod dataset;
pub mod regression;
