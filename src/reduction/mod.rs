pub mod event_data;
pub mod kinematics;
pub mod reducer;
