//! Chain access for the staking client.
//!
//! Everything that touches the RPC node lives here:
//! - [`RpcClient`]: JSON-RPC 2.0 over HTTP
//! - [`abi`]: call encoding, word decoding, selectors and event topics
//! - [`ChainReader`]: typed read-only contract calls
//! - [`ChainWriter`]: transaction submission and confirmation through a [`SigningSession`]
//! - [`EventReader`]: the four staking event streams merged into one history
//!
//! The reader, writer and event source are traits so the coordinator can be
//! driven by an in-memory chain in tests.

pub mod abi;
pub mod error;
pub mod events;
pub mod reader;
pub mod rpc;
pub mod writer;

pub use error::ChainError;
pub use events::{block_windows, merge_history, EventReader, EventSource, RpcEventSource};
pub use reader::{ChainReader, RpcChainReader};
pub use rpc::RpcClient;
pub use writer::{
    ChainWriter, NodeSigner, RpcChainWriter, SigningSession, TransactionRequest, TxReceipt,
    WriteCall,
};
