pub mod item;
pub mod metric;
pub mod trending;

pub use item::*;
pub use metric::*;
pub use trending::*;
