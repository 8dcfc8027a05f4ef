use serde::{Deserialize, Serialize};

/// A channel that was used to solve an environment.
///
/// The URL is stored as it was passed in, it can contain environment
/// variable placeholders. The names of those variables are kept so that a
/// consumer knows which variables need to be set to reproduce the
/// environment.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Channel {
    /// The URL of the channel.
    pub url: String,

    /// Environment variables used in the URL.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub used_env_vars: Vec<String>,
}

impl From<String> for Channel {
    fn from(url: String) -> Self {
        Self {
            url,
            used_env_vars: Vec::new(),
        }
    }
}

impl From<&str> for Channel {
    fn from(url: &str) -> Self {
        Self::from(url.to_string())
    }
}

impl From<&rattler_conda_types::Channel> for Channel {
    fn from(channel: &rattler_conda_types::Channel) -> Self {
        Self::from(channel.base_url.to_string())
    }
}

impl From<rattler_conda_types::Channel> for Channel {
    fn from(channel: rattler_conda_types::Channel) -> Self {
        Self::from(&channel)
    }
}
