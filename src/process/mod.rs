pub mod probe;
pub mod state;
pub mod supervisor;

pub use probe::*;
pub use state::*;
pub use supervisor::*;
