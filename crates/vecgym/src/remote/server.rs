//! Worker process hosting remote replicas.

use super::protocol::{self, Request, Response};
use crate::env::Registry;
use crate::vector::LocalEnv;
use crate::{Result, VecGymError};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Accepts connections and hosts one `LocalEnv` per connection.
pub struct WorkerServer {
    listener: TcpListener,
    registry: Arc<Registry>,
}

impl WorkerServer {
    pub async fn bind(addr: &str, registry: Registry) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            registry: Arc::new(registry),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` completes
    pub async fn serve_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(addr = %self.local_addr()?, envs = self.registry.len(), "worker listening");
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!(%peer, "accepted connection");
                    let registry = Arc::clone(&self.registry);
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, registry).await {
                            warn!(%peer, error = %err, "connection dropped");
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("worker shutting down");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, registry: Arc<Registry>) -> Result<()> {
    stream.set_nodelay(true)?;
    let mut transport = protocol::transport(stream);
    let mut env: Option<LocalEnv> = None;

    while let Some(request) = protocol::recv::<_, Request>(&mut transport).await? {
        // Replica calls run on the blocking pool
        let registry = Arc::clone(&registry);
        let mut current = env.take();
        let (response, current) = tokio::task::spawn_blocking(move || {
            let response = handle_request(request, &mut current, &registry);
            (response, current)
        })
        .await
        .map_err(|err| VecGymError::Remote(format!("replica task failed: {err}")))?;
        env = current;
        protocol::send(&mut transport, &response).await?;
    }

    if let Some(mut env) = env {
        env.close();
    }
    debug!("connection closed by client");
    Ok(())
}

fn handle_request(request: Request, env: &mut Option<LocalEnv>, registry: &Registry) -> Response {
    match request {
        Request::Create {
            env_id,
            seed,
            transforms,
        } => match LocalEnv::new(&env_id, seed, registry, &transforms) {
            Ok(local) => {
                let response = Response::Created {
                    observation_space: local.observation_space().clone(),
                    action_space: local.action_space().clone(),
                    max_episode_steps: local.max_episode_steps(),
                };
                if let Some(mut old) = env.replace(local) {
                    old.close();
                }
                debug!(%env_id, ?seed, "created replica");
                response
            }
            Err(err) => {
                warn!(%env_id, error = %err, "replica creation failed");
                Response::error(&err)
            }
        },
        Request::Reset => match env {
            Some(env) => Response::Observation(env.reset()),
            None => not_created(),
        },
        Request::Step { action } => match env {
            Some(env) => Response::Step(env.step(&action)),
            None => not_created(),
        },
        Request::Close => {
            if let Some(mut env) = env.take() {
                env.close();
            }
            Response::Closed
        }
    }
}

fn not_created() -> Response {
    Response::error(&VecGymError::Remote("no replica created on this connection".into()))
}

/// A `WorkerServer` on its own thread and runtime, stopped on drop.
pub struct BackgroundWorker {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl BackgroundWorker {
    /// Bind `addr` (port 0 picks a free port) and start serving
    pub fn spawn(addr: &str, registry: Registry) -> Result<Self> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<SocketAddr>>(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let addr = addr.to_string();

        let thread = thread::Builder::new()
            .name("vecgym-worker".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err.into()));
                        return;
                    }
                };
                runtime.block_on(async move {
                    let server = match WorkerServer::bind(&addr, registry).await {
                        Ok(server) => server,
                        Err(err) => {
                            let _ = ready_tx.send(Err(err));
                            return;
                        }
                    };
                    let _ = ready_tx.send(server.local_addr());
                    let shutdown = async {
                        let _ = shutdown_rx.await;
                    };
                    if let Err(err) = server.serve_until(shutdown).await {
                        warn!(error = %err, "worker stopped");
                    }
                });
            })?;

        let addr = ready_rx
            .recv()
            .map_err(|_| VecGymError::Remote("worker thread exited before binding".into()))??;

        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
