pub mod heritage;
pub mod mpa;
