//! Infrastructure: the error type, the traits at the external seams, and the
//! HTTP clients that realize them.
//!
//! - [`error`] - the library-wide error type
//! - [`traits`] - storage node, replica, and remote-log interfaces
//! - [`storage`] - HTTP client for the Merkle storage node
//! - [`remote`] - HTTP client for another log node (secondary or primary)
//! - [`shutdown`] - graceful-shutdown signaling

pub mod error;
pub mod remote;
pub mod shutdown;
pub mod storage;
pub mod traits;

pub use error::{LogError, Result};
pub use remote::RemoteLog;
pub use shutdown::{shutdown_signal, ShutdownCoordinator, ShutdownSignal};
pub use storage::StorageClient;
pub use traits::{AddLeafOutcome, PrimaryLog, Replica, TreeBackend};
