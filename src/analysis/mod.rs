pub mod cuts;
pub mod resolution;
