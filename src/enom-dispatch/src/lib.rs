//! Rate-limited request queue.
//!
//! Every upstream call goes through one [`Dispatcher`]: tasks run one at a
//! time in submission order, and after each task settles the queue sleeps a
//! random delay before starting the next one. The delay applies after failed
//! tasks too, so an error burst cannot turn into a retry storm.
//!
//! This is an anti-abuse throttle, not a scheduler: no priorities, no
//! cancellation, no parallelism.

mod dispatcher;

pub use dispatcher::{DelayRange, DispatchError, Dispatcher};
