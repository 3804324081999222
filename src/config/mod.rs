pub mod bridge;
pub mod repair;
pub mod settings;

pub use bridge::*;
pub use repair::*;
pub use settings::*;
