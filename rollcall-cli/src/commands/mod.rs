pub mod start;
pub mod status;
pub mod sync;
