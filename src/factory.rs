//! The capability the pool needs from a transport.
//!
//! The pool never opens sockets or speaks a protocol itself. Everything it
//! knows about a connection comes through a [`ConnectionFactory`]: how to
//! create one for an endpoint, whether an existing one is still alive, and
//! how to close it.

use std::fmt;
use std::hash::Hash;

use async_trait::async_trait;

use crate::error::ConnectError;

/// Creates, probes and closes connections for the pool.
///
/// # Example
///
/// ```rust,ignore
/// struct EchoFactory;
///
/// #[async_trait]
/// impl ConnectionFactory for EchoFactory {
///     type Endpoint = ServerAddress;
///     type Connection = EchoClient;
///
///     async fn create(&self, endpoint: &ServerAddress) -> Result<EchoClient, ConnectError> {
///         EchoClient::connect(endpoint.host(), endpoint.port()).await
///     }
///
///     async fn validate(&self, _endpoint: &ServerAddress, client: &EchoClient) -> bool {
///         client.ping().await.is_ok()
///     }
/// }
/// ```
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Identity of a server the pool keeps a sub-pool for.
    type Endpoint: Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static;

    /// The pooled connection type.
    type Connection: Send + Sync + 'static;

    /// Open a new connection to `endpoint`.
    async fn create(&self, endpoint: &Self::Endpoint) -> Result<Self::Connection, ConnectError>;

    /// Liveness probe. The default trusts every connection.
    async fn validate(&self, _endpoint: &Self::Endpoint, _connection: &Self::Connection) -> bool {
        true
    }

    /// Close a connection. Best effort; failures stay inside the factory.
    async fn destroy(&self, _endpoint: &Self::Endpoint, connection: Self::Connection) {
        drop(connection);
    }
}
