pub mod channels;
pub mod tracks;

pub use channels::*;
pub use tracks::*;
