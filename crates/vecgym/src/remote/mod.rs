//! Replicas hosted by worker processes.
//!
//! A `WorkerServer` hosts one replica per TCP connection. On the client side
//! a `WorkerPool` owns the runtime driving those connections, and each
//! `RemoteEnv` returns a `RemoteCall` for every request so a caller can
//! dispatch to many replicas before collecting any reply.

mod client;
pub mod protocol;
mod server;

pub use client::{RemoteCall, RemoteEnv, WorkerPool};
pub use server::{BackgroundWorker, WorkerServer};
