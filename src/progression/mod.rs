pub mod badges;
pub mod engine;
pub mod locks;
pub mod state;
pub mod streak;

pub use badges::*;
pub use engine::*;
pub use locks::*;
pub use state::*;
pub use streak::*;
