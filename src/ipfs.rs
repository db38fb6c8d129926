//! # IPFS
//!
//! Content-addressed reads through public HTTP gateways.
//!
//! Names have the form `<cid>/<path>[?checksum=<hex>]`. Every gateway is an
//! [`HttpFs`] that maps the name onto its own URL layout, wrapped in a
//! [`ChecksumFs`] that verifies the whole body before returning it. The
//! gateways are combined in a [`ChainFs`] that tries them in a fresh random
//! order on every call, so no single gateway is relied upon and none is
//! trusted: pass a checksum to detect tampered content.
//!
//! | Style | URL for `<cid>/a/b.json` |
//! |-------|--------------------------|
//! | [`GatewayStyle::Path`] | `https://<host>/ipfs/<cid>/a/b.json` |
//! | [`GatewayStyle::Subdomain`] | `https://<cid>.<host>/a/b.json` |

use std::fmt;
use std::sync::Arc;

use reqwest::blocking::Client;
use url::Url;

use crate::path::check_path;
use crate::uri::{RelativeUri, uri_path};
use crate::{
    ChainFs, ChecksumConfig, ChecksumFs, Context, File, FileSystem, FsError, FsRef, HashAlgorithm,
    HttpFs, Metadata, Protocol, VerifyMode,
};

/// How a gateway lays out content identifiers in its URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GatewayStyle {
    /// `/ipfs/<cid>/<path>` on the gateway host.
    Path,
    /// `<path>` on the `<cid>.<host>` subdomain.
    Subdomain,
}

/// A gateway endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GatewayConfig {
    /// `http` or `https`.
    pub scheme: String,
    /// Host, optionally with a port.
    pub host: String,
    /// URL layout.
    pub style: GatewayStyle,
}

impl GatewayConfig {
    /// An `https` gateway.
    pub fn https(host: impl Into<String>, style: GatewayStyle) -> Self {
        Self {
            scheme: "https".into(),
            host: host.into(),
            style,
        }
    }

    fn base(&self) -> Result<Url, FsError> {
        let raw = format!("{}://{}/", self.scheme, self.host);
        Url::parse(&raw).map_err(|e| FsError::InvalidUri {
            uri: raw,
            reason: e.to_string(),
        })
    }
}

/// Public gateways used when none are configured.
pub fn default_gateways() -> Vec<GatewayConfig> {
    use GatewayStyle::{Path, Subdomain};
    [
        ("ipfs.io", Path),
        ("gateway.pinata.cloud", Path),
        ("trustless-gateway.link", Path),
        ("dweb.link", Subdomain),
        ("storry.tv", Path),
        ("w3s.link", Path),
        ("4everland.io", Path),
        ("flk-ipfs.xyz", Path),
        ("ipfs.cyou", Path),
        ("nftstorage.link", Path),
    ]
    .into_iter()
    .map(|(host, style)| GatewayConfig::https(host, style))
    .collect()
}

/// IPFS settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IpfsConfig {
    /// Gateways to try.
    pub gateways: Vec<GatewayConfig>,
    /// Algorithm for `?checksum=`.
    pub algorithm: HashAlgorithm,
    /// Seed for the gateway order; random when `None`.
    pub seed: Option<u64>,
}

impl Default for IpfsConfig {
    fn default() -> Self {
        Self {
            gateways: default_gateways(),
            algorithm: HashAlgorithm::default(),
            seed: None,
        }
    }
}

fn split_cid(name: &RelativeUri) -> (&str, &str) {
    name.path.split_once('/').unwrap_or((name.path.as_str(), ""))
}

/// `https://<host>/ipfs/<cid>/<path>?<query>`.
pub fn path_resolution(base: &Url, name: &str) -> Result<Url, FsError> {
    let name = RelativeUri::parse(name);
    let (cid, path) = split_cid(&name);
    let mut url = base.clone();
    url.set_path(&format!("/ipfs/{cid}/{path}"));
    url.set_query(name.query.as_deref());
    url.set_fragment(None);
    Ok(url)
}

/// `https://<cid>.<host>/<path>?<query>`.
pub fn subdomain_resolution(base: &Url, name: &str) -> Result<Url, FsError> {
    let name = RelativeUri::parse(name);
    let (cid, path) = split_cid(&name);
    let host = base.host_str().unwrap_or_default();
    let mut url = base.clone();
    url.set_host(Some(&format!("{cid}.{host}")))
        .map_err(|e| FsError::InvalidUri {
            uri: format!("{cid}.{host}"),
            reason: e.to_string(),
        })?;
    url.set_path(&format!("/{path}"));
    url.set_query(name.query.as_deref());
    url.set_fragment(None);
    Ok(url)
}

/// Reads `<cid>/<path>` names through a randomly ordered chain of verified
/// gateways.
///
/// Only reads are meaningful: `read_dir` and `glob` are not supported by the
/// gateways.
pub struct IpfsFs {
    chain: ChainFs,
}

impl IpfsFs {
    /// Assemble the gateway chain.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidUri`] if a gateway's scheme or host is invalid
    pub fn new(ctx: Context, client: Client, config: &IpfsConfig) -> Result<Self, FsError> {
        let checksum = ChecksumConfig {
            algorithm: config.algorithm,
            mode: VerifyMode::AfterOpen,
            ..ChecksumConfig::default()
        };
        let mut members: Vec<FsRef> = Vec::with_capacity(config.gateways.len());
        for gateway in &config.gateways {
            let http = HttpFs::with_client(ctx.clone(), client.clone(), gateway.base()?)?;
            let http = match gateway.style {
                GatewayStyle::Path => http.with_resolver(path_resolution),
                GatewayStyle::Subdomain => http.with_resolver(subdomain_resolution),
            };
            members.push(Arc::new(ChecksumFs::new(http, checksum.clone())));
        }
        let chain = ChainFs::new(members);
        let chain = match config.seed {
            Some(seed) => chain.with_seed(seed),
            None => chain.with_random_order(),
        };
        Ok(Self { chain })
    }
}

impl fmt::Debug for IpfsFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpfsFs").field("chain", &self.chain).finish()
    }
}

impl FileSystem for IpfsFs {
    fn open(&self, path: &str) -> Result<Box<dyn File>, FsError> {
        check_path("open", path).map_err(|e| e.layer("ipfs"))?;
        self.chain.open(path)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        check_path("read_file", path).map_err(|e| e.layer("ipfs"))?;
        self.chain.read_file(path)
    }

    fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        check_path("stat", path).map_err(|e| e.layer("ipfs"))?;
        self.chain.stat(path)
    }
}

/// Protocol for `ipfs://<cid>/<path>` and `ipfs+gateway://<cid>/<path>`.
///
/// The returned path is `<cid>/<path>` with the query kept, so a
/// `?checksum=` parameter reaches the verifying layer.
#[derive(Clone)]
pub struct IpfsProto {
    ctx: Context,
    client: Client,
    config: IpfsConfig,
}

impl IpfsProto {
    /// A protocol reading through the gateways in `config`.
    pub fn new(ctx: Context, client: Client, config: IpfsConfig) -> Self {
        Self { ctx, client, config }
    }
}

impl fmt::Debug for IpfsProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpfsProto")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Protocol for IpfsProto {
    fn file_system(&self, uri: &Url) -> Result<(FsRef, String), FsError> {
        let invalid = |reason: &str| FsError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };
        if uri.scheme() != "ipfs" && uri.scheme() != "ipfs+gateway" {
            return Err(invalid(&format!("unexpected scheme: {}", uri.scheme())));
        }
        if uri.cannot_be_a_base() {
            return Err(invalid("opaque URI not allowed"));
        }
        if uri.fragment().is_some() {
            return Err(invalid("fragment not allowed"));
        }
        let cid = uri
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing content identifier"))?;

        let mut path = match uri_path(uri, false).as_str() {
            "." => cid.to_string(),
            rest => format!("{cid}/{rest}"),
        };
        if let Some(query) = uri.query() {
            path.push('?');
            path.push_str(query);
        }
        let fs = IpfsFs::new(self.ctx.clone(), self.client.clone(), &self.config)?;
        Ok((Arc::new(fs), path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn proto() -> IpfsProto {
        IpfsProto::new(Context::background(), Client::new(), IpfsConfig::default())
    }

    #[test]
    fn path_style_urls() {
        let base = url("https://ipfs.io/");
        assert_eq!(
            path_resolution(&base, "bafyCID/a/b.json?x=1").unwrap().as_str(),
            "https://ipfs.io/ipfs/bafyCID/a/b.json?x=1"
        );
        assert_eq!(
            path_resolution(&base, "bafyCID").unwrap().as_str(),
            "https://ipfs.io/ipfs/bafyCID/"
        );
    }

    #[test]
    fn subdomain_style_urls() {
        let base = url("https://dweb.link/");
        assert_eq!(
            subdomain_resolution(&base, "bafycid/a/b.json").unwrap().as_str(),
            "https://bafycid.dweb.link/a/b.json"
        );
        let base = url("http://localhost:8080/");
        assert_eq!(
            subdomain_resolution(&base, "bafycid").unwrap().as_str(),
            "http://bafycid.localhost:8080/"
        );
    }

    #[test]
    fn default_gateway_list() {
        let gateways = default_gateways();
        assert_eq!(gateways.len(), 10);
        assert!(gateways.iter().all(|g| g.scheme == "https"));
        let subdomain: Vec<_> = gateways
            .iter()
            .filter(|g| g.style == GatewayStyle::Subdomain)
            .map(|g| g.host.as_str())
            .collect();
        assert_eq!(subdomain, ["dweb.link"]);
    }

    #[test]
    fn proto_paths() {
        let (_, path) = proto()
            .file_system(&url("ipfs://QmCase/dir/./file.json?checksum=ff"))
            .unwrap();
        assert_eq!(path, "QmCase/dir/file.json?checksum=ff");

        let (_, path) = proto().file_system(&url("ipfs+gateway://cid")).unwrap();
        assert_eq!(path, "cid");
    }

    #[test]
    fn proto_rejects_bad_uris() {
        for bad in ["https://cid/x", "ipfs:cid", "ipfs:///x", "ipfs://cid/x#frag"] {
            let err = proto().file_system(&url(bad)).err().expect("expected error");
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{bad}");
        }
    }

    #[test]
    fn bad_gateway_host_fails_assembly() {
        let config = IpfsConfig {
            gateways: vec![GatewayConfig::https("bad host", GatewayStyle::Path)],
            ..IpfsConfig::default()
        };
        assert!(IpfsFs::new(Context::background(), Client::new(), &config).is_err());
    }

    #[test]
    fn invalid_names_fail_without_requests() {
        let config = IpfsConfig {
            gateways: Vec::new(),
            ..IpfsConfig::default()
        };
        let fs = IpfsFs::new(Context::background(), Client::new(), &config).unwrap();
        let err = fs.open("/abs").unwrap_err();
        assert!(matches!(err, FsError::Layer { layer: "ipfs", .. }));
        assert!(fs.open("cid/x").unwrap_err().is_not_found());
    }
}
