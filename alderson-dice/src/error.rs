//! Error taxonomy for chain resolution, client construction and contract calls.

use alloy::transports::TransportError;

use crate::eip1193::ProviderRpcError;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while resolving chains, building clients or calling contracts.
///
/// Nothing is caught inside the crate: every variant propagates to the caller,
/// who decides the user-facing behavior (e.g. prompting for a network switch).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The chain identifier is not one of the supported networks.
    #[error("unsupported chain ID: {0}")]
    UnsupportedChain(String),

    /// A signing operation was requested without a wallet provider.
    #[error("a wallet provider is required to sign transactions")]
    MissingProvider,

    /// Malformed address, ABI, function name or argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The wallet reports a different network than the handle was built for.
    #[error("wallet is on chain {actual}, expected chain {expected}")]
    ChainMismatch {
        /// Chain the handle is bound to.
        expected: u64,
        /// Chain reported by the wallet.
        actual: u64,
    },

    /// The injected provider rejected a request.
    #[error(transparent)]
    Provider(#[from] ProviderRpcError),

    /// RPC transport failure or error response, surfaced by the client
    /// library.
    #[error("transport: {0}")]
    Transport(TransportError),

    /// Contract call failure, surfaced by the client library.
    #[error("contract: {0}")]
    Contract(alloy::contract::Error),

    /// A response did not have the expected JSON shape.
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::InvalidArgument`].
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<TransportError> for Error {
    /// Error responses carrying an EIP-1193 provider code (user rejection,
    /// unauthorized account, ...) become [`Error::Provider`].
    fn from(err: TransportError) -> Self {
        if let Some(resp) = err.as_error_resp() {
            if (4000..5000).contains(&resp.code) {
                return Self::Provider(ProviderRpcError::from_payload(resp));
            }
        }
        Self::Transport(err)
    }
}

impl From<alloy::contract::Error> for Error {
    fn from(err: alloy::contract::Error) -> Self {
        use alloy::contract::Error as ContractError;

        match err {
            ContractError::UnknownFunction(name) => {
                Self::invalid(format!("unknown function `{name}`"))
            }
            ContractError::UnknownSelector(selector) => {
                Self::invalid(format!("unknown function selector {selector}"))
            }
            ContractError::AbiError(e) => Self::invalid(e.to_string()),
            ContractError::TransportError(e) => Self::from(e),
            other => Self::Contract(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_function_is_an_invalid_argument() {
        let err = Error::from(alloy::contract::Error::UnknownFunction("roll".to_owned()));
        assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("roll")));
    }

    #[test]
    fn user_rejection_becomes_a_provider_error() {
        let resp = alloy::rpc::json_rpc::ErrorPayload {
            code: 4001,
            message: "User rejected the request.".into(),
            data: None,
        };
        let err = Error::from(TransportError::ErrorResp(resp));
        assert!(matches!(err, Error::Provider(ref e) if e.code == ProviderRpcError::USER_REJECTED));
    }

    #[test]
    fn node_errors_stay_transport_errors() {
        let resp = alloy::rpc::json_rpc::ErrorPayload {
            code: -32000,
            message: "execution reverted".into(),
            data: None,
        };
        assert!(matches!(
            Error::from(TransportError::ErrorResp(resp)),
            Error::Transport(_)
        ));
    }

    #[test]
    fn display_names_the_chain() {
        let err = Error::UnsupportedChain("0x89".to_owned());
        assert_eq!(err.to_string(), "unsupported chain ID: 0x89");
    }
}
