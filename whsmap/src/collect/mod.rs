pub mod georss;
pub mod global_variables;
