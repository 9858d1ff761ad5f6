pub mod journal;
pub mod reference;
pub mod trade;
pub mod user;

pub use journal::*;
pub use reference::*;
pub use trade::*;
pub use user::*;
