//! Resource Watch
//!
//! Self-healing watch streams over a cluster API.
//!
//! Watches against a remote API server are unreliable: the server closes them,
//! they time out, or they fail to establish at all. This crate keeps one
//! logical watch per resource type alive and merges all of them into a single
//! bounded channel of [`NormalizedEvent`]s.
//!
//! # Example
//!
//! ```no_run
//! use resource_watch::{start_watches, WatchConfig, WatchRegistry};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example<R: WatchRegistry>(registry: R) -> Result<(), resource_watch::WatchError> {
//! let cancel = CancellationToken::new();
//! let mut events = start_watches(WatchConfig::default(), async move { Ok(registry) }, cancel.clone()).await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - **Acquirer**: retries an opener at a fixed interval until it succeeds
//! - **Supervisor**: consumes a watch and reacquires it whenever it dies
//! - **Launcher**: one supervisor per resource type, one shared channel

pub mod acquirer;
pub mod backoff;
pub mod change;
pub mod config;
pub mod error;
pub mod event;
pub mod handle;
pub mod launcher;
pub mod object;
pub mod supervisor;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use acquirer::acquire_watch;
pub use backoff::{RetryPolicy, RetryStrategy};
pub use change::{ChangeKind, RawChange, WatchFailure};
pub use config::WatchConfig;
pub use error::{MetaError, WatchError};
pub use event::NormalizedEvent;
pub use handle::{WatchHandle, WatchOpener};
pub use launcher::{start_watches, TrackedWatch, WatchRegistry};
pub use object::{ResourceMeta, WatchObject};
pub use supervisor::{Supervisor, SupervisorState};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{ScriptedOpener, TestObject};
