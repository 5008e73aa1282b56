//! Validated listener setup.
//!
//! # Responsibilities
//! - Turn raw `[server]`/`[port.*]` sections into validated [`Port`]s
//! - Enforce protocol-combination rules (fatal on violation)
//! - Strip peer networking in standalone mode
//! - Derive the client (loopback RPC) and overlay (advertised peer)
//!   descriptors
//!
//! Any error here aborts startup; a node with a half-configured listener
//! set must not come up.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

use crate::config::schema::{GatewayConfig, PortSection};

/// Wire protocols a port may speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    Http,
    Https,
    Ws,
    Wss,
    Peer,
}

impl Protocol {
    fn parse(token: &str) -> Option<Protocol> {
        match token {
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            "ws" => Some(Protocol::Ws),
            "wss" => Some(Protocol::Wss),
            "peer" => Some(Protocol::Peer),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Ws => "ws",
            Protocol::Wss => "wss",
            Protocol::Peer => "peer",
        }
    }
}

/// A validated network listener description. Built once at startup,
/// immutable afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub ip: IpAddr,
    pub port: u16,
    pub protocol: BTreeSet<Protocol>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub admin_ips: Vec<IpAddr>,
    pub admin_user: Option<String>,
    pub admin_password: Option<String>,
    pub secure_gateway: Option<IpAddr>,
    pub ssl_key: Option<PathBuf>,
    pub ssl_cert: Option<PathBuf>,
    pub ssl_chain: Option<PathBuf>,
    /// Maximum concurrent connections; zero means unlimited.
    pub limit: usize,
}

impl Port {
    pub fn has(&self, protocol: Protocol) -> bool {
        self.protocol.contains(&protocol)
    }

    /// Serves client RPC over HTTP or HTTPS.
    pub fn rpc(&self) -> bool {
        self.has(Protocol::Http) || self.has(Protocol::Https)
    }

    pub fn websockets(&self) -> bool {
        self.has(Protocol::Ws) || self.has(Protocol::Wss)
    }

    /// Expects a TLS handshake before any HTTP traffic.
    pub fn secure(&self) -> bool {
        self.has(Protocol::Https) || self.has(Protocol::Wss)
    }

    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

/// Connection details internal components use to reach the node's own RPC
/// interface over loopback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEndpoint {
    pub secure: bool,
    pub address: SocketAddr,
    pub user: Option<String>,
    pub password: Option<String>,
    pub admin_user: Option<String>,
    pub admin_password: Option<String>,
}

/// The full validated listener set plus its derived descriptors.
#[derive(Debug, Clone)]
pub struct Setup {
    pub ports: Vec<Port>,
    /// First HTTP/HTTPS port, for loopback RPC; `None` when no port serves
    /// client RPC.
    pub client: Option<ClientEndpoint>,
    /// Address advertised to peers; `None` when no port speaks the peer
    /// protocol.
    pub overlay: Option<SocketAddr>,
}

/// Fatal configuration errors. None of these are recoverable; the process
/// must not start.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("required section [server] is missing")]
    MissingServerSection,

    #[error("missing section [port.{0}]")]
    MissingPortSection(String),

    #[error("missing 'ip' in [port.{0}]")]
    MissingIp(String),

    #[error("invalid 'ip' \"{value}\" in [port.{name}]")]
    InvalidIp { name: String, value: String },

    #[error("missing 'port' in [port.{0}]")]
    MissingPort(String),

    #[error("port 0 in [port.{0}] is invalid")]
    InvalidPort(String),

    #[error("missing 'protocol' in [port.{0}]")]
    MissingProtocol(String),

    #[error("unknown protocol \"{value}\" in [port.{name}]")]
    UnknownProtocol { name: String, value: String },

    #[error("invalid protocol combination in [port.{0}]")]
    ProtocolConflict(String),

    #[error("more than one peer protocol configured in [server]")]
    MultiplePeerPorts,
}

/// Build the validated [`Setup`] from raw configuration.
///
/// `standalone` strips the peer protocol from every port; a port left with
/// no protocols is dropped entirely.
pub fn build_setup(config: &GatewayConfig, standalone: bool) -> Result<Setup, SetupError> {
    let server = config
        .server
        .as_ref()
        .ok_or(SetupError::MissingServerSection)?;

    let mut ports = Vec::with_capacity(server.ports.len());
    for name in &server.ports {
        let section = config
            .port
            .get(name)
            .ok_or_else(|| SetupError::MissingPortSection(name.clone()))?;
        let merged = section.merged_over(&server.defaults);
        ports.push(to_port(name, &merged)?);
    }

    if standalone {
        for port in &mut ports {
            port.protocol.remove(&Protocol::Peer);
        }
        ports.retain(|port| {
            if port.protocol.is_empty() {
                tracing::info!(port = %port.name, "dropping port left empty without peer protocol");
                false
            } else {
                true
            }
        });
    } else {
        let peer_ports = ports.iter().filter(|p| p.has(Protocol::Peer)).count();
        if peer_ports > 1 {
            return Err(SetupError::MultiplePeerPorts);
        }
        if peer_ports == 0 {
            tracing::warn!("no peer protocol configured");
        }
    }

    let client = derive_client(&ports);
    let overlay = derive_overlay(&ports);

    Ok(Setup {
        ports,
        client,
        overlay,
    })
}

fn to_port(name: &str, section: &PortSection) -> Result<Port, SetupError> {
    let ip_text = section
        .ip
        .as_deref()
        .ok_or_else(|| SetupError::MissingIp(name.to_string()))?;
    let ip: IpAddr = ip_text.parse().map_err(|_| SetupError::InvalidIp {
        name: name.to_string(),
        value: ip_text.to_string(),
    })?;

    let port = section
        .port
        .ok_or_else(|| SetupError::MissingPort(name.to_string()))?;
    if port == 0 {
        return Err(SetupError::InvalidPort(name.to_string()));
    }

    let protocol = parse_protocol_set(
        name,
        section
            .protocol
            .as_deref()
            .ok_or_else(|| SetupError::MissingProtocol(name.to_string()))?,
    )?;
    if protocol.is_empty() {
        return Err(SetupError::MissingProtocol(name.to_string()));
    }

    // Client RPC and peer traffic never share a socket with websockets,
    // and a peer port cannot also serve client RPC: the overlay takes the
    // socket unconditionally, so RPC there would be unreachable.
    let websockets = protocol.contains(&Protocol::Ws) || protocol.contains(&Protocol::Wss);
    let peer = protocol.contains(&Protocol::Peer);
    let rpc = protocol.contains(&Protocol::Http) || protocol.contains(&Protocol::Https);
    if (websockets && (peer || rpc)) || (peer && rpc) {
        return Err(SetupError::ProtocolConflict(name.to_string()));
    }

    let mut admin_ips = Vec::new();
    if let Some(entries) = &section.admin {
        for entry in entries {
            let ip = entry.parse().map_err(|_| SetupError::InvalidIp {
                name: name.to_string(),
                value: entry.clone(),
            })?;
            admin_ips.push(ip);
        }
    }

    let secure_gateway = match &section.secure_gateway {
        Some(value) => Some(value.parse().map_err(|_| SetupError::InvalidIp {
            name: name.to_string(),
            value: value.clone(),
        })?),
        None => None,
    };

    Ok(Port {
        name: name.to_string(),
        ip,
        port,
        protocol,
        user: section.user.clone(),
        password: section.password.clone(),
        admin_ips,
        admin_user: section.admin_user.clone(),
        admin_password: section.admin_password.clone(),
        secure_gateway,
        ssl_key: section.ssl_key.as_ref().map(PathBuf::from),
        ssl_cert: section.ssl_cert.as_ref().map(PathBuf::from),
        ssl_chain: section.ssl_chain.as_ref().map(PathBuf::from),
        limit: section.limit.unwrap_or(0),
    })
}

fn parse_protocol_set(name: &str, raw: &str) -> Result<BTreeSet<Protocol>, SetupError> {
    let mut protocols = BTreeSet::new();
    for token in raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let protocol = Protocol::parse(token).ok_or_else(|| SetupError::UnknownProtocol {
            name: name.to_string(),
            value: token.to_string(),
        })?;
        protocols.insert(protocol);
    }
    Ok(protocols)
}

// First HTTP/HTTPS port becomes the loopback RPC endpoint. A wildcard bind
// is rewritten to the loopback address so internal clients can connect.
fn derive_client(ports: &[Port]) -> Option<ClientEndpoint> {
    let port = ports.iter().find(|p| p.rpc())?;
    let ip = match port.ip {
        IpAddr::V4(v4) if v4.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(v6) if v6.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        other => other,
    };
    Some(ClientEndpoint {
        secure: port.has(Protocol::Https),
        address: SocketAddr::new(ip, port.port),
        user: port.user.clone(),
        password: port.password.clone(),
        admin_user: port.admin_user.clone(),
        admin_password: port.admin_password.clone(),
    })
}

fn derive_overlay(ports: &[Port]) -> Option<SocketAddr> {
    ports
        .iter()
        .find(|p| p.has(Protocol::Peer))
        .map(Port::bind_address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ServerSection;
    use std::collections::BTreeMap;

    fn section(ip: &str, port: u16, protocol: &str) -> PortSection {
        PortSection {
            ip: Some(ip.into()),
            port: Some(port),
            protocol: Some(protocol.into()),
            ..PortSection::default()
        }
    }

    fn config_with(ports: Vec<(&str, PortSection)>) -> GatewayConfig {
        let names = ports.iter().map(|(n, _)| n.to_string()).collect();
        let port = ports
            .into_iter()
            .map(|(n, s)| (n.to_string(), s))
            .collect::<BTreeMap<_, _>>();
        GatewayConfig {
            server: Some(ServerSection {
                ports: names,
                defaults: PortSection::default(),
            }),
            port,
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn missing_server_section_is_fatal() {
        let config = GatewayConfig::default();
        assert_eq!(
            build_setup(&config, false).unwrap_err(),
            SetupError::MissingServerSection
        );
    }

    #[test]
    fn missing_port_section_is_fatal() {
        let mut config = config_with(vec![("rpc", section("127.0.0.1", 5005, "http"))]);
        config
            .server
            .as_mut()
            .expect("server section")
            .ports
            .push("ghost".into());
        assert_eq!(
            build_setup(&config, false).unwrap_err(),
            SetupError::MissingPortSection("ghost".into())
        );
    }

    #[test]
    fn zero_port_is_fatal() {
        let config = config_with(vec![("rpc", section("127.0.0.1", 0, "http"))]);
        assert!(matches!(
            build_setup(&config, false),
            Err(SetupError::InvalidPort(_))
        ));
    }

    #[test]
    fn missing_protocol_is_fatal() {
        let mut bad = section("127.0.0.1", 5005, "http");
        bad.protocol = None;
        let config = config_with(vec![("rpc", bad)]);
        assert!(matches!(
            build_setup(&config, false),
            Err(SetupError::MissingProtocol(_))
        ));
    }

    #[test]
    fn websocket_and_peer_cannot_share_a_port() {
        let config = config_with(vec![("mixed", section("127.0.0.1", 6005, "ws,peer"))]);
        assert_eq!(
            build_setup(&config, false).unwrap_err(),
            SetupError::ProtocolConflict("mixed".into())
        );
    }

    #[test]
    fn websocket_and_http_cannot_share_a_port() {
        let config = config_with(vec![("mixed", section("127.0.0.1", 6005, "http wss"))]);
        assert_eq!(
            build_setup(&config, false).unwrap_err(),
            SetupError::ProtocolConflict("mixed".into())
        );
    }

    #[test]
    fn peer_and_http_cannot_share_a_port() {
        let config = config_with(vec![("mixed", section("0.0.0.0", 51235, "peer,http"))]);
        assert_eq!(
            build_setup(&config, false).unwrap_err(),
            SetupError::ProtocolConflict("mixed".into())
        );
    }

    #[test]
    fn two_peer_ports_are_fatal() {
        let config = config_with(vec![
            ("peer1", section("0.0.0.0", 51235, "peer")),
            ("peer2", section("0.0.0.0", 51236, "peer")),
        ]);
        assert_eq!(
            build_setup(&config, false).unwrap_err(),
            SetupError::MultiplePeerPorts
        );
    }

    #[test]
    fn standalone_strips_peer_and_drops_empty_ports() {
        let config = config_with(vec![
            ("rpc", section("127.0.0.1", 5005, "http")),
            ("peer", section("0.0.0.0", 51235, "peer")),
        ]);
        let setup = build_setup(&config, true).expect("setup should build");
        assert_eq!(setup.ports.len(), 1);
        assert_eq!(setup.ports[0].name, "rpc");
        assert!(setup.overlay.is_none());
    }

    #[test]
    fn shared_defaults_flow_into_ports() {
        let mut config = config_with(vec![(
            "rpc",
            PortSection {
                port: Some(5005),
                protocol: Some("http".into()),
                ..PortSection::default()
            },
        )]);
        config.server.as_mut().expect("server section").defaults.ip = Some("127.0.0.1".into());
        let setup = build_setup(&config, false).expect("setup should build");
        assert_eq!(setup.ports[0].ip, "127.0.0.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn client_endpoint_rewrites_wildcard_to_loopback() {
        let mut rpc = section("0.0.0.0", 5005, "https");
        rpc.user = Some("alice".into());
        rpc.password = Some("secret".into());
        let config = config_with(vec![
            ("rpc", rpc),
            ("peer", section("0.0.0.0", 51235, "peer")),
        ]);
        let setup = build_setup(&config, false).expect("setup should build");

        let client = setup.client.expect("client endpoint derived");
        assert!(client.secure);
        assert_eq!(client.address, "127.0.0.1:5005".parse().unwrap());
        assert_eq!(client.user.as_deref(), Some("alice"));

        assert_eq!(setup.overlay, Some("0.0.0.0:51235".parse().unwrap()));
    }

    #[test]
    fn no_rpc_port_means_no_client_endpoint() {
        let config = config_with(vec![("peer", section("0.0.0.0", 51235, "peer"))]);
        let setup = build_setup(&config, false).expect("setup should build");
        assert!(setup.client.is_none());
    }
}
