//! Job scheduling
//!
//! The scheduler is the producer side of the directory queue: it discovers
//! descriptors through a [`crate::storage::JobStore`], claims them, runs the
//! crawl pipeline for each and records the terminal status.

mod scheduler;

pub use scheduler::JobScheduler;
