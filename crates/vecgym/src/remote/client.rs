//! Client side of the worker pool.

use super::protocol::{self, Request, Response, Transport};
use crate::env::StepResult;
use crate::spaces::DynSpace;
use crate::vector::TransformConfig;
use crate::{Result, VecGymError};
use ndarray::ArrayD;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

type Reply = oneshot::Sender<Result<Response>>;

/// Handle to a worker pool address plus the runtime that drives every
/// connection made to it.
pub struct WorkerPool {
    addr: SocketAddr,
    runtime: Runtime,
}

impl WorkerPool {
    /// Resolve `addr` and start the client runtime
    pub fn connect(addr: &str) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("vecgym-client")
            .enable_all()
            .build()?;
        let resolved = runtime
            .block_on(tokio::net::lookup_host(addr))?
            .next()
            .ok_or_else(|| VecGymError::Config(format!("worker address {addr} did not resolve")))?;
        info!(addr = %resolved, "using worker pool");
        Ok(Self {
            addr: resolved,
            runtime,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// A pending reply from a worker.
///
/// `get` blocks the calling thread, so it must not be called from inside an
/// async context.
#[must_use = "a RemoteCall does nothing unless collected with `get`"]
pub struct RemoteCall<T> {
    state: CallState,
    decode: fn(Response) -> Result<T>,
}

enum CallState {
    Waiting(oneshot::Receiver<Result<Response>>),
    Failed(VecGymError),
}

impl<T> RemoteCall<T> {
    fn dispatch(
        tx: &mpsc::UnboundedSender<(Request, Reply)>,
        request: Request,
        decode: fn(Response) -> Result<T>,
    ) -> Self {
        let (reply_tx, reply_rx) = oneshot::channel();
        let state = match tx.send((request, reply_tx)) {
            Ok(()) => CallState::Waiting(reply_rx),
            Err(_) => CallState::Failed(connection_closed()),
        };
        Self { state, decode }
    }

    /// Block until the worker answers
    pub fn get(self) -> Result<T> {
        let response = match self.state {
            CallState::Failed(err) => return Err(err),
            CallState::Waiting(rx) => rx.blocking_recv().map_err(|_| connection_closed())??,
        };
        (self.decode)(response)
    }
}

fn connection_closed() -> VecGymError {
    VecGymError::Remote("worker connection closed".into())
}

/// One replica hosted by a worker, reached over its own connection
pub struct RemoteEnv {
    tx: mpsc::UnboundedSender<(Request, Reply)>,
    observation_space: DynSpace,
    action_space: DynSpace,
    max_episode_steps: usize,
}

impl RemoteEnv {
    /// Open a connection and build the replica on the worker.
    ///
    /// Blocks until the worker confirms creation; construction errors on
    /// the worker come back as the same error variant.
    pub fn new(
        pool: &WorkerPool,
        env_id: &str,
        seed: Option<u64>,
        transforms: &TransformConfig,
    ) -> Result<Self> {
        let stream = pool.runtime.block_on(TcpStream::connect(pool.addr))?;
        stream.set_nodelay(true)?;
        let (tx, rx) = mpsc::unbounded_channel();
        pool.runtime.spawn(connection_task(protocol::transport(stream), rx));

        let create = Request::Create {
            env_id: env_id.to_string(),
            seed,
            transforms: transforms.clone(),
        };
        let (observation_space, action_space, max_episode_steps) =
            RemoteCall::dispatch(&tx, create, |response| match response {
                Response::Created {
                    observation_space,
                    action_space,
                    max_episode_steps,
                } => Ok((observation_space, action_space, max_episode_steps)),
                other => Err(other.unexpected("Created")),
            })
            .get()?;

        debug!(env_id, ?seed, "created remote replica");
        Ok(Self {
            tx,
            observation_space,
            action_space,
            max_episode_steps,
        })
    }

    pub fn reset(&self) -> RemoteCall<ArrayD<f32>> {
        RemoteCall::dispatch(&self.tx, Request::Reset, |response| match response {
            Response::Observation(obs) => Ok(obs),
            other => Err(other.unexpected("Observation")),
        })
    }

    pub fn step(&self, action: ArrayD<f32>) -> RemoteCall<StepResult> {
        RemoteCall::dispatch(&self.tx, Request::Step { action }, |response| match response {
            Response::Step(result) => Ok(result),
            other => Err(other.unexpected("Step")),
        })
    }

    pub fn close(&self) -> RemoteCall<()> {
        RemoteCall::dispatch(&self.tx, Request::Close, |response| match response {
            Response::Closed => Ok(()),
            other => Err(other.unexpected("Closed")),
        })
    }

    pub fn observation_space(&self) -> &DynSpace {
        &self.observation_space
    }

    pub fn action_space(&self) -> &DynSpace {
        &self.action_space
    }

    pub fn max_episode_steps(&self) -> usize {
        self.max_episode_steps
    }
}

/// Forward requests in order and route each reply back to its caller.
///
/// Ends when the `RemoteEnv` is dropped or the connection fails; calls still
/// queued then fail with a closed-connection error.
async fn connection_task(
    mut transport: Transport<TcpStream>,
    mut rx: mpsc::UnboundedReceiver<(Request, Reply)>,
) {
    while let Some((request, reply)) = rx.recv().await {
        let response = roundtrip(&mut transport, &request).await;
        let failed = response.is_err();
        if let Err(err) = &response {
            warn!(error = %err, "worker connection failed");
        }
        // Caller may have dropped its RemoteCall
        let _ = reply.send(response);
        if failed {
            break;
        }
    }
}

async fn roundtrip(transport: &mut Transport<TcpStream>, request: &Request) -> Result<Response> {
    protocol::send(transport, request).await?;
    protocol::recv(transport)
        .await?
        .ok_or_else(connection_closed)
}
