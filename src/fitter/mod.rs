pub mod models;
pub mod peak_finder;
pub mod peak_fit;
