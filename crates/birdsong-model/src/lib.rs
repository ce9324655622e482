pub mod recording;
pub mod sanitize;
pub mod species;

pub use recording::*;
pub use species::*;
