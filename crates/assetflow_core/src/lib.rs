//! # ASSETFLOW Core
//!
//! Scheduling kernel shared by every asset lane:
//! - [`ConcurrentQueue`]: unbounded FIFO with enqueue/dequeue wake-up hints
//! - [`ScalingWorker`]: self-throttling runner for one [`Stage`]
//! - [`ShutdownBroadcast`]: one-shot stop signal for every worker
//!
//! ## Architecture Rules
//!
//! 1. **Hints, not messages** - a wake-up says "look again", never "here is work"
//! 2. **Bounded per worker** - each worker caps its own concurrency, nothing is global
//! 3. **No owned threads** - work units borrow the ambient task pool
//!
//! ## Example
//!
//! ```rust,ignore
//! use assetflow_core::{ConcurrentQueue, QueueEvent, ShutdownBroadcast, WorkerHandle};
//!
//! let shutdown = ShutdownBroadcast::new();
//! let handle = WorkerHandle::spawn(my_stage, 0, runtime.handle(), &shutdown);
//! input.watch(QueueEvent::Enqueued, handle.waker());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod queue;
pub mod shutdown;
pub mod worker;

pub use error::{WorkError, WorkResult};
pub use queue::{ConcurrentQueue, QueueEvent};
pub use shutdown::{ShutdownBroadcast, ShutdownListener, ShutdownSubscription};
pub use worker::{
    resolve_target_concurrency, ScalingWorker, Stage, WorkPolicy, WorkerHandle, WorkerStats,
};
