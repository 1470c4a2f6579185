//! Wire messages between `RemoteEnv` and `WorkerServer`.
//!
//! Messages are bincode-encoded and carried in length-delimited frames.

use crate::env::StepResult;
use crate::spaces::DynSpace;
use crate::vector::TransformConfig;
use crate::{Result, VecGymError};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use ndarray::ArrayD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// A connection carrying length-delimited frames
pub type Transport<T> = Framed<T, LengthDelimitedCodec>;

/// Wrap a byte stream in the frame codec
pub fn transport<T>(io: T) -> Transport<T>
where
    T: AsyncRead + AsyncWrite,
{
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(64 * 1024 * 1024)
        .new_codec();
    Framed::new(io, codec)
}

/// Client to worker
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Build this connection's replica
    Create {
        env_id: String,
        seed: Option<u64>,
        transforms: TransformConfig,
    },
    Reset,
    Step { action: ArrayD<f32> },
    Close,
}

/// Worker to client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Created {
        observation_space: DynSpace,
        action_space: DynSpace,
        max_episode_steps: usize,
    },
    Observation(ArrayD<f32>),
    Step(StepResult),
    Closed,
    Error { kind: ErrorKind, message: String },
}

/// Which `VecGymError` a worker-side failure maps back to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Config,
    UnknownEnv,
    Other,
}

impl Response {
    pub fn error(err: &VecGymError) -> Self {
        let (kind, message) = match err {
            VecGymError::Config(msg) => (ErrorKind::Config, msg.clone()),
            VecGymError::UnknownEnv(id) => (ErrorKind::UnknownEnv, id.clone()),
            other => (ErrorKind::Other, other.to_string()),
        };
        Response::Error { kind, message }
    }

    fn name(&self) -> &'static str {
        match self {
            Response::Created { .. } => "Created",
            Response::Observation(_) => "Observation",
            Response::Step(_) => "Step",
            Response::Closed => "Closed",
            Response::Error { .. } => "Error",
        }
    }

    /// Turn an `Error` response back into the matching error, and anything
    /// other than `expected` into a protocol error
    pub(crate) fn unexpected(self, expected: &str) -> VecGymError {
        match self {
            Response::Error { kind, message } => match kind {
                ErrorKind::Config => VecGymError::Config(message),
                ErrorKind::UnknownEnv => VecGymError::UnknownEnv(message),
                ErrorKind::Other => VecGymError::Remote(message),
            },
            other => VecGymError::Remote(format!(
                "expected {} response, got {}",
                expected,
                other.name()
            )),
        }
    }
}

/// Send one message
pub async fn send<T, M>(transport: &mut Transport<T>, message: &M) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
    M: Serialize,
{
    let payload = bincode::serialize(message)?;
    transport.send(Bytes::from(payload)).await?;
    Ok(())
}

/// Receive one message; `None` once the peer has closed the connection
pub async fn recv<T, M>(transport: &mut Transport<T>) -> Result<Option<M>>
where
    T: AsyncRead + AsyncWrite + Unpin,
    M: DeserializeOwned,
{
    match transport.next().await {
        Some(frame) => Ok(Some(bincode::deserialize(&frame?)?)),
        None => Ok(None),
    }
}
