//! Channels are the sources conda packages are fetched from.

use crate::{ParsePlatformError, Platform};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use url::Url;

/// Configuration that determines how channel names are resolved to urls.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// The url that is prepended to channels that are specified by name, e.g.
    /// `https://conda.anaconda.org/`.
    pub channel_alias: Url,

    /// The directory relative paths are resolved against.
    pub root_dir: PathBuf,
}

impl ChannelConfig {
    /// Constructs a configuration with the default channel alias and the given root directory.
    pub fn default_with_root_dir(root_dir: PathBuf) -> Self {
        Self {
            channel_alias: Url::parse("https://conda.anaconda.org/")
                .expect("the default channel alias is a valid url"),
            root_dir,
        }
    }

    /// Returns the canonical name of a channel url: the part after the channel alias if the url
    /// starts with the alias, otherwise the url itself.
    pub fn canonical_name(&self, base_url: &Url) -> String {
        match base_url.as_str().strip_prefix(self.channel_alias.as_str()) {
            Some(name) => name.trim_end_matches('/').to_owned(),
            None => base_url.as_str().trim_end_matches('/').to_owned(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::default_with_root_dir(std::env::current_dir().unwrap_or_default())
    }
}

/// A conda channel.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Channel {
    /// The platforms this channel is restricted to, `None` means all platforms.
    pub platforms: Option<Vec<Platform>>,

    /// The url of the channel, always ends with a `/`.
    pub base_url: Url,

    /// The name of the channel.
    pub name: Option<String>,
}

/// An error that can occur when parsing a channel.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ParseChannelError {
    /// A platform in the platform selector is invalid
    #[error(transparent)]
    ParsePlatformError(#[from] ParsePlatformError),

    /// The url could not be parsed
    #[error("could not parse url: {0}")]
    ParseUrlError(#[from] url::ParseError),

    /// The path is not valid
    #[error("invalid path '{0}'")]
    InvalidPath(String),

    /// The channel name is empty
    #[error("empty channel name")]
    InvalidName,
}

impl Channel {
    /// Parses a channel from a string. The string may be a name (`conda-forge`), a url or a
    /// path, optionally followed by a platform selector: `conda-forge[linux-64,noarch]`.
    pub fn from_str(
        str: impl AsRef<str>,
        config: &ChannelConfig,
    ) -> Result<Self, ParseChannelError> {
        let str = str.as_ref().trim();
        let (platforms, channel) = parse_platforms(str)?;

        if channel.is_empty() {
            return Err(ParseChannelError::InvalidName);
        }

        let channel = if channel.contains("://") {
            let url = Url::parse(channel)?;
            Channel::from_url(url, config)
        } else if is_path(channel) {
            if channel.starts_with('~') {
                return Err(ParseChannelError::InvalidPath(channel.to_owned()));
            }
            Channel::from_directory(&config.root_dir.join(channel))?
        } else {
            Channel::from_name(channel, config)?
        };

        Ok(Channel {
            platforms,
            ..channel
        })
    }

    /// Constructs a channel from a name, resolved against the channel alias.
    pub fn from_name(name: &str, config: &ChannelConfig) -> Result<Self, ParseChannelError> {
        let name = name.trim_end_matches('/');
        let base_url = config.channel_alias.join(&format!("{name}/"))?;
        Ok(Self {
            platforms: None,
            base_url,
            name: Some(name.to_owned()),
        })
    }

    /// Constructs a channel from a url.
    pub fn from_url(url: Url, config: &ChannelConfig) -> Self {
        let base_url = with_trailing_slash(url);
        let name = config.canonical_name(&base_url);
        Self {
            platforms: None,
            base_url,
            name: Some(name),
        }
    }

    /// Constructs a channel from a directory on disk.
    pub fn from_directory(path: &Path) -> Result<Self, ParseChannelError> {
        let path = normalize_path(path);
        let base_url = Url::from_directory_path(&path)
            .map_err(|_| ParseChannelError::InvalidPath(path.display().to_string()))?;
        Ok(Self {
            platforms: None,
            name: Some(base_url.as_str().trim_end_matches('/').to_owned()),
            base_url,
        })
    }

    /// The name of the channel, or its url if it has no name.
    pub fn canonical_name(&self) -> String {
        match &self.name {
            Some(name) if !name.contains("://") => name.clone(),
            _ => self.base_url.as_str().trim_end_matches('/').to_owned(),
        }
    }

    /// The identifier stored in records that originate from this channel.
    pub fn record_channel(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_owned()
    }

    /// Returns true if a record with the given channel identifier came from this channel. The
    /// identifier may either be the url of the channel or its name.
    pub fn matches_record_channel(&self, channel: &str) -> bool {
        let channel = channel.trim_end_matches('/');
        channel == self.base_url.as_str().trim_end_matches('/')
            || self.name.as_deref() == Some(channel)
    }

    /// Returns the url of a subdirectory of the channel.
    pub fn platform_url(&self, platform: Platform) -> Url {
        self.base_url
            .join(&format!("{}/", platform.as_str()))
            .expect("platform is a valid url fragment")
    }

    /// Returns the platforms explicitly selected for this channel, or the current platform and
    /// `noarch` if no platforms were selected.
    pub fn platforms_or_default(&self) -> Vec<Platform> {
        match &self.platforms {
            Some(platforms) => platforms.clone(),
            None => vec![Platform::current(), Platform::NoArch],
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_name())?;
        if let Some(platforms) = &self.platforms {
            write!(f, "[{}]", platforms.iter().join(","))?;
        }
        Ok(())
    }
}

/// Splits off a trailing platform selector, `channel[linux-64,noarch]`.
fn parse_platforms(channel: &str) -> Result<(Option<Vec<Platform>>, &str), ParsePlatformError> {
    if channel.ends_with(']') {
        if let Some(start) = channel.rfind('[') {
            let platforms = channel[start + 1..channel.len() - 1]
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Platform::from_str)
                .collect::<Result<Vec<_>, _>>()?;
            let platforms = (!platforms.is_empty()).then_some(platforms);
            return Ok((platforms, &channel[..start]));
        }
    }
    Ok((None, channel))
}

fn is_path(channel: &str) -> bool {
    channel.starts_with('/')
        || channel.starts_with("./")
        || channel.starts_with("../")
        || channel.starts_with('~')
        || channel.starts_with("\\\\")
        || (channel.len() > 2 && channel.as_bytes()[1] == b':')
}

fn with_trailing_slash(url: Url) -> Url {
    if url.path().ends_with('/') {
        url
    } else {
        let mut url = url;
        let path = format!("{}/", url.path());
        url.set_path(&path);
        url
    }
}

/// Removes `.` and `..` components without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                result.pop();
            }
            component => result.push(component.as_os_str()),
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::{Channel, ChannelConfig};
    use crate::Platform;
    use std::path::PathBuf;
    use url::Url;

    fn config() -> ChannelConfig {
        ChannelConfig::default_with_root_dir(PathBuf::from("/home/user"))
    }

    #[test]
    fn test_parse_name() {
        let channel = Channel::from_str("conda-forge", &config()).unwrap();
        assert_eq!(
            channel.base_url,
            Url::parse("https://conda.anaconda.org/conda-forge/").unwrap()
        );
        assert_eq!(channel.name.as_deref(), Some("conda-forge"));
        assert_eq!(channel.canonical_name(), "conda-forge");
        assert_eq!(
            channel.platform_url(Platform::Linux64).as_str(),
            "https://conda.anaconda.org/conda-forge/linux-64/"
        );
        assert_eq!(
            channel.record_channel(),
            "https://conda.anaconda.org/conda-forge"
        );
        assert!(channel.matches_record_channel("conda-forge"));
        assert!(channel.matches_record_channel("https://conda.anaconda.org/conda-forge/"));
        assert!(!channel.matches_record_channel("bioconda"));
    }

    #[test]
    fn test_parse_url_with_platforms() {
        let channel =
            Channel::from_str("https://repo.example.com/stable[linux-64, noarch]", &config())
                .unwrap();
        assert_eq!(channel.base_url.as_str(), "https://repo.example.com/stable/");
        assert_eq!(
            channel.platforms,
            Some(vec![Platform::Linux64, Platform::NoArch])
        );
        assert_eq!(
            channel.to_string(),
            "https://repo.example.com/stable[linux-64,noarch]"
        );
    }

    #[test]
    fn test_alias_url_gets_name() {
        let channel =
            Channel::from_str("https://conda.anaconda.org/bioconda", &config()).unwrap();
        assert_eq!(channel.canonical_name(), "bioconda");
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_path() {
        let channel = Channel::from_str("./channels/../local", &config()).unwrap();
        assert_eq!(channel.base_url.as_str(), "file:///home/user/local/");
        let channel = Channel::from_str("/opt/channel", &config()).unwrap();
        assert_eq!(channel.base_url.as_str(), "file:///opt/channel/");
    }

    #[test]
    fn test_invalid_platform() {
        assert!(Channel::from_str("conda-forge[linux-128]", &config()).is_err());
    }
}
