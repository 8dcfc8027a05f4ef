use std::sync::Arc;

use super::{ChannelConfig, Gateway, GatewayInner};

/// The default number of packages that are loaded concurrently by a single
/// query.
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 50;

/// A builder for constructing a [`Gateway`].
#[derive(Default)]
pub struct GatewayBuilder {
    channel_config: ChannelConfig,
    max_concurrent_requests: Option<usize>,
}

impl GatewayBuilder {
    /// New instance of the builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the channel configuration to use when reading repodata.
    #[must_use]
    pub fn with_channel_config(mut self, channel_config: ChannelConfig) -> Self {
        self.set_channel_config(channel_config);
        self
    }

    /// Set the channel configuration to use when reading repodata.
    pub fn set_channel_config(&mut self, channel_config: ChannelConfig) -> &mut Self {
        self.channel_config = channel_config;
        self
    }

    /// Sets the maximum number of packages a single query loads concurrently.
    #[must_use]
    pub fn with_max_concurrent_requests(mut self, max_concurrent_requests: usize) -> Self {
        self.set_max_concurrent_requests(max_concurrent_requests);
        self
    }

    /// Sets the maximum number of packages a single query loads concurrently.
    pub fn set_max_concurrent_requests(&mut self, max_concurrent_requests: usize) -> &mut Self {
        self.max_concurrent_requests = Some(max_concurrent_requests);
        self
    }

    /// Finish the construction of the gateway returning a constructed gateway.
    pub fn finish(self) -> Gateway {
        Gateway {
            inner: Arc::new(GatewayInner {
                channel_config: self.channel_config,
                max_concurrent_requests: self
                    .max_concurrent_requests
                    .unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS)
                    .max(1),
                subdirs: Default::default(),
            }),
        }
    }
}
