pub mod gate;
pub mod identity;
pub mod role;
pub mod session;

pub use gate::*;
pub use identity::*;
pub use role::*;
pub use session::*;
