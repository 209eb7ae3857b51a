pub mod daily;
pub mod validate;
