pub mod psd;
pub mod run_params;
