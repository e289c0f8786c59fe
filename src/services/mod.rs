pub mod analysis;
pub mod queue;
