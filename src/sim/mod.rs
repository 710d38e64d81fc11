/// Battery parameters and the hourly charge transition.
pub mod battery;
/// Synthetic consumption profile.
pub mod consumption;
pub mod downsample;
pub mod engine;
pub mod summary;
pub mod types;
