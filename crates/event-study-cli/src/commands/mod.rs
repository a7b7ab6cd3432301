pub mod events;
pub mod quality;
pub mod significance;
pub mod study;
