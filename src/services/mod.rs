pub mod spotify;
pub mod sync;
pub mod token;
