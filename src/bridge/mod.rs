pub mod framing;
pub mod jsonrpc;
pub mod output;
pub mod router;
pub mod runner;
pub mod shutdown;
pub mod sse;

pub use framing::LineBuffer;
pub use jsonrpc::*;
pub use output::OutputSink;
pub use router::MessageRouter;
pub use runner::BridgeRunner;
pub use shutdown::*;
pub use sse::*;
