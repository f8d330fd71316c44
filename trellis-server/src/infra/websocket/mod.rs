pub mod hub;
pub mod messages;

pub use hub::*;
pub use messages::*;
