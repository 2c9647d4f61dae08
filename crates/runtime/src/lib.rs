pub mod cancel;
pub mod metrics;
pub mod throttle;

pub use cancel::*;
pub use metrics::*;
pub use throttle::*;
