pub mod geodesy;
pub mod mat;
pub mod polygon;
pub mod precision;
pub mod vec;

pub use geodesy::*;
pub use mat::*;
pub use polygon::*;
pub use precision::*;
pub use vec::*;
