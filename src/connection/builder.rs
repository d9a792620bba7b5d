//! Construction of [`PeerConnection`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use super::PeerConnection;
use crate::{
    codec::{LightweightCodec, MessageCodec},
    fragment::FragmentationConfig,
    packet::{PoolConfig, PoolConfigError, SegmentPool},
    qos::{DefaultRanking, TransportRanking},
    scheduler::{MessagesSent, SchedulerKind},
    transport::Transport,
};

/// Loadable settings for a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub pool: PoolConfig,
    pub fragmentation: FragmentationConfig,
    pub scheduler: SchedulerKind,
}

/// Errors raised while building a connection.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectionError {
    /// The pool settings were rejected.
    #[error(transparent)]
    Pool(#[from] PoolConfigError),
}

/// Builder for [`PeerConnection`].
///
/// # Examples
///
/// ```
/// use groupwire::{connection::PeerConnection, scheduler::SchedulerKind};
///
/// let connection = PeerConnection::builder()
///     .scheduler(SchedulerKind::Immediate)
///     .build()
///     .expect("default pool settings are valid");
/// assert!(connection.transports().is_empty());
/// ```
pub struct PeerConnectionBuilder<C = LightweightCodec> {
    codec: C,
    config: ConnectionConfig,
    pool: Option<SegmentPool>,
    ranking: Box<dyn TransportRanking>,
    listener: Option<UnboundedSender<MessagesSent>>,
    transports: Vec<Arc<dyn Transport>>,
}

impl PeerConnectionBuilder<LightweightCodec> {
    /// Create a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            codec: LightweightCodec,
            config: ConnectionConfig::default(),
            pool: None,
            ranking: Box::new(DefaultRanking),
            listener: None,
            transports: Vec::new(),
        }
    }
}

impl Default for PeerConnectionBuilder<LightweightCodec> {
    fn default() -> Self { Self::new() }
}

impl<C: MessageCodec> PeerConnectionBuilder<C> {
    /// Replace the inner message codec.
    #[must_use]
    pub fn codec<C2: MessageCodec>(self, codec: C2) -> PeerConnectionBuilder<C2> {
        PeerConnectionBuilder {
            codec,
            config: self.config,
            pool: self.pool,
            ranking: self.ranking,
            listener: self.listener,
            transports: self.transports,
        }
    }

    /// Apply loaded settings.
    #[must_use]
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Size classes for a pool owned by this connection. Ignored when
    /// [`pool`](Self::pool) supplies a shared pool.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.config.pool = config;
        self
    }

    /// Draw packets from an existing pool.
    #[must_use]
    pub fn pool(mut self, pool: SegmentPool) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn fragmentation(mut self, config: FragmentationConfig) -> Self {
        self.config.fragmentation = config;
        self
    }

    #[must_use]
    pub fn scheduler(mut self, kind: SchedulerKind) -> Self {
        self.config.scheduler = kind;
        self
    }

    /// Order in which transports are offered to requirements.
    #[must_use]
    pub fn ranking(mut self, ranking: impl TransportRanking + 'static) -> Self {
        self.ranking = Box::new(ranking);
        self
    }

    /// Report completed sends to `listener`.
    #[must_use]
    pub fn on_messages_sent(mut self, listener: UnboundedSender<MessagesSent>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Start with `transport` attached.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transports.push(transport);
        self
    }

    /// Build the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Pool`] if the pool settings are invalid.
    pub fn build(self) -> Result<PeerConnection<C>, ConnectionError> {
        let pool = match self.pool {
            Some(pool) => pool,
            None => SegmentPool::new(self.config.pool)?,
        };
        let scheduler = self.config.scheduler.build(self.listener);
        let connection = PeerConnection::from_parts(
            self.codec,
            pool,
            self.config.fragmentation,
            self.ranking,
            scheduler,
        );
        for transport in self.transports {
            connection.add_transport(transport);
        }
        Ok(connection)
    }
}
