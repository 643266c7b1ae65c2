//! Transport selection for RPC clients.
//!
//! A [`TransportDescriptor`] is chosen once per client and turned into a
//! concrete [`alloy`] transport:
//!
//! - [`TransportDescriptor::Http`]: direct HTTP JSON-RPC.
//! - [`TransportDescriptor::InjectedProvider`]: requests forwarded to an
//!   [`Eip1193Provider`](crate::Eip1193Provider) through [`Eip1193Transport`].
//! - [`TransportDescriptor::Fallback`]: an ordered list tried in sequence by
//!   [`FallbackTransport`].

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use alloy::rpc::client::RpcClient;
use alloy::rpc::json_rpc::{
    ErrorPayload, RequestPacket, Response, ResponsePacket, ResponsePayload, SerializedRequest,
};
use alloy::transports::http::Http;
use alloy::transports::http::reqwest::Client;
use alloy::transports::{BoxTransport, TransportError, TransportErrorKind, TransportFut};
use serde_json::Value;
use serde_json::value::to_raw_value;
use tower::{Service, ServiceExt};
use url::Url;

use crate::eip1193::{ProviderHandle, is_terminal_error};
use crate::error::{Error, Result};

/// How a client reaches the network.
#[derive(Debug, Clone)]
pub enum TransportDescriptor {
    /// Direct HTTP JSON-RPC to an endpoint.
    Http(Url),
    /// Requests forwarded to an injected wallet provider.
    InjectedProvider(ProviderHandle),
    /// Members tried in order until one answers.
    Fallback(Vec<TransportDescriptor>),
}

/// Tag of a [`TransportDescriptor`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// [`TransportDescriptor::Http`].
    Http,
    /// [`TransportDescriptor::InjectedProvider`].
    InjectedProvider,
    /// [`TransportDescriptor::Fallback`].
    Fallback,
}

impl TransportDescriptor {
    /// The variant tag.
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::Http(_) => TransportKind::Http,
            Self::InjectedProvider(_) => TransportKind::InjectedProvider,
            Self::Fallback(_) => TransportKind::Fallback,
        }
    }

    /// Whether every endpoint behind this descriptor is a loopback HTTP
    /// node. Local clients poll faster.
    #[must_use]
    pub fn is_local(&self) -> bool {
        match self {
            Self::Http(url) => matches!(
                url.host_str(),
                Some("localhost" | "127.0.0.1" | "[::1]" | "::1")
            ),
            Self::InjectedProvider(_) => false,
            Self::Fallback(members) => !members.is_empty() && members.iter().all(Self::is_local),
        }
    }

    /// Build the concrete transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a fallback list is empty.
    pub fn to_transport(&self) -> Result<BoxTransport> {
        match self {
            Self::Http(url) => Ok(BoxTransport::new(Http::<Client>::new(url.clone()))),
            Self::InjectedProvider(provider) => {
                Ok(BoxTransport::new(Eip1193Transport::new(provider.clone())))
            }
            Self::Fallback(members) => {
                let members = members
                    .iter()
                    .map(|member| {
                        member.to_transport().map(|transport| FallbackMember {
                            label: member.to_string(),
                            transport,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                FallbackTransport::new(members).map(BoxTransport::new)
            }
        }
    }

    /// Build an [`RpcClient`] over this transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a fallback list is empty.
    pub fn connect(&self) -> Result<RpcClient> {
        Ok(RpcClient::new(self.to_transport()?, self.is_local()))
    }
}

impl fmt::Display for TransportDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(url) => write!(f, "http({url})"),
            Self::InjectedProvider(provider) => write!(f, "injected({})", provider.label()),
            Self::Fallback(members) => {
                f.write_str("fallback[")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{member}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Transport forwarding JSON-RPC requests to an injected provider.
///
/// A provider error carrying a disconnect code (4900/4901) becomes a
/// transport error; any other provider error is returned as a JSON-RPC
/// error response, which a surrounding [`FallbackTransport`] may still pass
/// on to its next member.
#[derive(Debug, Clone)]
pub struct Eip1193Transport {
    provider: ProviderHandle,
}

impl Eip1193Transport {
    /// Wrap a provider.
    #[must_use]
    pub const fn new(provider: ProviderHandle) -> Self {
        Self { provider }
    }
}

impl Service<RequestPacket> for Eip1193Transport {
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = TransportFut<'static>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, packet: RequestPacket) -> Self::Future {
        let provider = self.provider.clone();
        Box::pin(async move {
            match packet {
                RequestPacket::Single(req) => {
                    forward(&provider, &req).await.map(ResponsePacket::Single)
                }
                RequestPacket::Batch(reqs) => {
                    let mut responses = Vec::with_capacity(reqs.len());
                    for req in &reqs {
                        responses.push(forward(&provider, req).await?);
                    }
                    Ok(ResponsePacket::Batch(responses))
                }
            }
        })
    }
}

/// Forward one serialized request to the provider and wrap its answer.
async fn forward(
    provider: &ProviderHandle,
    req: &SerializedRequest,
) -> Result<Response, TransportError> {
    let params = match req.params() {
        Some(raw) => serde_json::from_str(raw.get()).map_err(TransportErrorKind::custom)?,
        None => Value::Null,
    };

    let payload = match provider.request(req.method(), params).await {
        Ok(value) => {
            ResponsePayload::Success(to_raw_value(&value).map_err(TransportErrorKind::custom)?)
        }
        Err(e) if e.is_disconnected() => {
            tracing::debug!(method = req.method(), code = e.code, "provider disconnected");
            return Err(TransportErrorKind::custom(e));
        }
        Err(e) => {
            let data = e
                .data
                .as_ref()
                .map(to_raw_value)
                .transpose()
                .map_err(TransportErrorKind::custom)?;
            ResponsePayload::Failure(ErrorPayload {
                code: e.code,
                message: e.message.into(),
                data,
            })
        }
    };

    Ok(Response {
        id: req.id().clone(),
        payload,
    })
}

#[derive(Clone)]
struct FallbackMember {
    label: String,
    transport: BoxTransport,
}

/// Ordered fallback over several transports.
///
/// Each request goes to the first member. A transport error, or an error
/// response another endpoint might answer (unsupported method, unauthorized,
/// rate limit), moves it to the next one. Terminal errors (user rejection,
/// rejected transaction, revert) are returned as-is, as is whatever the last
/// member answers. There is no retry or ranking: the order is fixed at
/// construction.
#[derive(Clone)]
pub struct FallbackTransport {
    members: Arc<[FallbackMember]>,
}

impl FallbackTransport {
    fn new(members: Vec<FallbackMember>) -> Result<Self> {
        if members.is_empty() {
            return Err(Error::invalid(
                "fallback transport needs at least one member",
            ));
        }
        Ok(Self {
            members: members.into(),
        })
    }

    /// Number of member transports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false`: construction rejects an empty list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Debug for FallbackTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.members.iter().map(|m| &m.label))
            .finish()
    }
}

impl Service<RequestPacket> for FallbackTransport {
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = TransportFut<'static>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, packet: RequestPacket) -> Self::Future {
        let members = Arc::clone(&self.members);
        Box::pin(async move {
            let mut last_err = None;

            for (i, member) in members.iter().enumerate() {
                let next = members.get(i + 1);
                match member.transport.clone().oneshot(packet.clone()).await {
                    Ok(response) => match (passable_error(&response), next) {
                        (Some(err), Some(next)) => {
                            tracing::warn!(
                                transport = %member.label,
                                next = %next.label,
                                code = err.code,
                                message = %err.message,
                                "error response, falling back"
                            );
                        }
                        _ => return Ok(response),
                    },
                    Err(e) => {
                        if let Some(next) = next {
                            tracing::warn!(
                                transport = %member.label,
                                next = %next.label,
                                error = %e,
                                "transport failed, falling back"
                            );
                        } else {
                            tracing::error!(
                                transport = %member.label,
                                error = %e,
                                "last transport failed"
                            );
                        }
                        last_err = Some(e);
                    }
                }
            }

            Err(last_err
                .unwrap_or_else(|| TransportErrorKind::custom_str("no fallback transports")))
        })
    }
}

/// The first error in `response` that is worth asking the next member about.
fn passable_error(response: &ResponsePacket) -> Option<&ErrorPayload> {
    let responses = match response {
        ResponsePacket::Single(single) => std::slice::from_ref(single),
        ResponsePacket::Batch(batch) => batch.as_slice(),
    };
    responses.iter().find_map(|r| match &r.payload {
        ResponsePayload::Failure(err) if !is_terminal_error(err.code, &err.message) => Some(err),
        _ => None,
    })
}
