pub mod analysis;
pub mod corrections;
pub mod status;
