pub mod budget_rules;
pub mod ml_blocker;
pub mod types;
