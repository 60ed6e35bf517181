pub mod builder;
pub mod matrix;
