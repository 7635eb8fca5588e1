pub mod config;
pub mod inspect;
pub mod sample;
pub mod solve;
