//! # Pretrained Weight Descriptors

use crate::cache::disk::DiskCacheConfig;
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

const X25: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_SDLC);

/// Build a cache key (bare cache file name) from a name and URL.
///
/// The key is ``{name}-{url crc16}-{url basename}``, or
/// ``{url crc16}-{url basename}`` without a name.
pub fn url_to_cache_key(
    name: Option<&str>,
    url: &str,
) -> anyhow::Result<String> {
    let hash = X25.checksum(url.as_bytes());
    let base_name = match url.rsplit('/').next() {
        Some(base) if !base.is_empty() => base,
        _ => bail!("url has no file name: {url}"),
    };
    Ok(match name {
        Some(n) => format!("{n}-{hash}-{base_name}"),
        None => format!("{hash}-{base_name}"),
    })
}

/// Get the cache resource key for a pretrained weights file.
///
/// # Arguments
///
/// - `cache_key`: the cache key (the bare cache file name).
///
/// # Returns
///
/// The cache resource key.
pub fn pretrained_weights_resource_key(cache_key: &str) -> Vec<String> {
    vec!["weights".to_string(), cache_key.to_string()]
}

/// Static [`PretrainedWeightsDescriptor`] provider.
#[derive(Debug)]
pub struct StaticPretrainedWeightsDescriptor<'a> {
    /// Name of the weights.
    pub name: &'a str,

    /// Description of the weights.
    pub description: &'a str,

    /// License.
    pub license: Option<&'a str>,

    /// Source URL.
    pub origin: Option<&'a str>,

    /// URLs to download the weights from; the first is used.
    pub urls: &'a [&'a str],
}

impl StaticPretrainedWeightsDescriptor<'_> {
    /// Convert to a [`PretrainedWeightsDescriptor`].
    pub fn to_descriptor(&self) -> PretrainedWeightsDescriptor {
        PretrainedWeightsDescriptor {
            name: self.name.to_string(),
            description: self.description.to_string(),
            license: self.license.map(|s| s.to_string()),
            origin: self.origin.map(|s| s.to_string()),
            urls: self.urls.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<&StaticPretrainedWeightsDescriptor<'_>> for PretrainedWeightsDescriptor {
    fn from(descriptor: &StaticPretrainedWeightsDescriptor) -> Self {
        descriptor.to_descriptor()
    }
}

/// A descriptor for a pretrained weights file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PretrainedWeightsDescriptor {
    /// Name of the weights.
    pub name: String,

    /// Description of the weights.
    pub description: String,

    /// License.
    pub license: Option<String>,

    /// Source URL.
    pub origin: Option<String>,

    /// URLs to download the weights from; the first is used.
    pub urls: Vec<String>,
}

impl PretrainedWeightsDescriptor {
    /// The primary download URL.
    pub fn url(&self) -> anyhow::Result<&str> {
        self.urls
            .first()
            .map(String::as_str)
            .with_context(|| format!("weights {:?} have no urls", self.name))
    }

    /// Cache Key
    ///
    /// The key is ``{name}-{url crc hash}-{url basename}``.
    pub fn cache_key(&self) -> anyhow::Result<String> {
        url_to_cache_key(Some(&self.name), self.url()?)
    }

    /// Read-Through Cache the Model Weights
    ///
    /// # Returns
    ///
    /// The disk location of the cached weights.
    #[tracing::instrument(skip(disk_cache), fields(name = %self.name))]
    pub fn fetch_weights(
        &self,
        disk_cache: &DiskCacheConfig,
    ) -> anyhow::Result<PathBuf> {
        let url = self.url()?;
        let resource = pretrained_weights_resource_key(&self.cache_key()?);

        disk_cache
            .fetch_resource(url, &resource)
            .with_context(|| format!("fetching weights {:?} from {url}", self.name))
    }
}

/// Static [`PretrainedWeightsMap`] builder.
#[derive(Debug)]
pub struct StaticPretrainedWeightsMap<'a> {
    /// List of static descriptors.
    pub items: &'a [&'a StaticPretrainedWeightsDescriptor<'a>],
}

impl StaticPretrainedWeightsMap<'_> {
    /// Convert to a [`PretrainedWeightsMap`].
    pub fn to_directory(&self) -> PretrainedWeightsMap {
        PretrainedWeightsMap {
            items: self
                .items
                .iter()
                .map(|d| {
                    let desc = d.to_descriptor();
                    (desc.name.clone(), desc)
                })
                .collect(),
        }
    }
}

impl From<&StaticPretrainedWeightsMap<'_>> for PretrainedWeightsMap {
    fn from(directory: &StaticPretrainedWeightsMap) -> Self {
        directory.to_directory()
    }
}

/// Directory of [`PretrainedWeightsDescriptor`]s.
#[derive(Debug, Clone, Default)]
pub struct PretrainedWeightsMap {
    /// Map of descriptors.
    pub items: BTreeMap<String, PretrainedWeightsDescriptor>,
}

impl PretrainedWeightsMap {
    /// Lookup a descriptor by name.
    pub fn lookup_by_name(
        &self,
        name: &str,
    ) -> Option<PretrainedWeightsDescriptor> {
        self.items.get(name).cloned()
    }

    /// Lookup a descriptor.
    pub fn try_lookup_by_name(
        &self,
        name: &str,
    ) -> anyhow::Result<PretrainedWeightsDescriptor> {
        match self.lookup_by_name(name) {
            Some(d) => Ok(d),
            None => bail!("Descriptor not found: {}", name),
        }
    }

    /// The default descriptor; the first by name.
    pub fn default_weights(&self) -> Option<PretrainedWeightsDescriptor> {
        self.items.values().next().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static WEIGHTS: StaticPretrainedWeightsMap = StaticPretrainedWeightsMap {
        items: &[&StaticPretrainedWeightsDescriptor {
            name: "my_weights",
            description: "some description of my weights.",
            license: Some("MIT"),
            origin: Some("https://github.com/my_org/my_model"),
            urls: &["https://example.com/models/my_model.pth", "mirror"],
        }],
    };

    #[test]
    fn test_static_descriptor_to_descriptor() {
        let s_desc = WEIGHTS.items[0];
        let d_desc: PretrainedWeightsDescriptor = s_desc.into();

        assert_eq!(d_desc.name, "my_weights");
        assert_eq!(d_desc.description, s_desc.description);
        assert_eq!(d_desc.license.as_deref(), Some("MIT"));
        assert_eq!(
            d_desc.urls,
            vec![
                "https://example.com/models/my_model.pth".to_string(),
                "mirror".to_string()
            ]
        );
        assert_eq!(d_desc.url().unwrap(), "https://example.com/models/my_model.pth");
    }

    #[test]
    fn test_cache_key() {
        let url = "https://example.com/models/my_model.pth";
        let hash = X25.checksum(url.as_bytes());

        assert_eq!(
            url_to_cache_key(Some("foo"), url).unwrap(),
            format!("foo-{hash}-my_model.pth")
        );
        assert_eq!(
            url_to_cache_key(None, url).unwrap(),
            format!("{hash}-my_model.pth")
        );
        assert!(url_to_cache_key(None, "https://example.com/").is_err());

        let desc = WEIGHTS.to_directory().lookup_by_name("my_weights").unwrap();
        assert_eq!(
            desc.cache_key().unwrap(),
            format!("my_weights-{hash}-my_model.pth")
        );

        assert_eq!(
            pretrained_weights_resource_key("k"),
            vec!["weights".to_string(), "k".to_string()]
        );
    }

    #[test]
    fn test_weights_map() {
        let map = WEIGHTS.to_directory();
        assert_eq!(map.items.len(), 1);
        assert!(map.lookup_by_name("missing").is_none());
        assert_eq!(
            map.try_lookup_by_name("missing").unwrap_err().to_string(),
            "Descriptor not found: missing"
        );
        assert_eq!(map.default_weights().unwrap().name, "my_weights");

        let empty = PretrainedWeightsDescriptor {
            urls: vec![],
            ..map.default_weights().unwrap()
        };
        assert!(empty.url().is_err());
    }
}
