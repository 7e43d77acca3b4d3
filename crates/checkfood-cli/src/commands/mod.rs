pub mod lookup;
pub mod recognize;
pub mod status;
