pub mod lookup;
pub mod processing;
