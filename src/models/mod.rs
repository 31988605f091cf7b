pub mod risk;
pub mod row;

pub use risk::*;
pub use row::*;
