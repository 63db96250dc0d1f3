pub mod cheatsheet;
pub mod game;
pub mod role;
pub mod series;

pub use cheatsheet::*;
pub use game::*;
pub use role::*;
pub use series::*;
