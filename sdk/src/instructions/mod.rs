pub mod builder;
pub mod escrow;

pub use builder::*;
pub use escrow::*;
