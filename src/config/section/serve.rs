//! `[serve]` section: the local preview server.
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"
//! port = 5277
//! watch = true
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

/// Where `typage serve` listens and whether it rebuilds on change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub interface: IpAddr,

    /// First port tried; taken ports are skipped upward.
    pub port: u16,

    /// Watch the project and rebuild affected pages.
    pub watch: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: Ipv4Addr::LOCALHOST.into(),
            port: 5277,
            watch: true,
        }
    }
}

impl ServeConfig {
    /// Addresses to try binding, starting at the configured port.
    pub fn candidate_addrs(&self, attempts: u16) -> impl Iterator<Item = SocketAddr> + '_ {
        (0..attempts)
            .map_while(|offset| self.port.checked_add(offset))
            .map(|port| SocketAddr::new(self.interface, port))
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.port == 0 {
            diag.error_with_hint(
                FieldPath::new("serve.port"),
                "port 0 is not a fixed port",
                "pick a free port such as 5277",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_lan_preview() {
        let config =
            test_parse_config("[serve]\ninterface = \"0.0.0.0\"\nport = 8080\nwatch = false");
        assert_eq!(config.serve.interface, IpAddr::from([0, 0, 0, 0]));
        assert_eq!(config.serve.port, 8080);
        assert!(!config.serve.watch);
    }

    #[test]
    fn test_defaults_listen_on_localhost_and_watch() {
        let serve = test_parse_config("[serve]\nport = 3000").serve;
        assert!(serve.interface.is_loopback());
        assert_eq!(serve.port, 3000);
        assert!(serve.watch);
    }

    #[test]
    fn test_candidate_addrs_stop_at_last_port() {
        let serve = ServeConfig {
            port: u16::MAX - 1,
            ..ServeConfig::default()
        };
        let ports: Vec<_> = serve.candidate_addrs(10).map(|addr| addr.port()).collect();
        assert_eq!(ports, vec![u16::MAX - 1, u16::MAX]);

        let first = ServeConfig::default().candidate_addrs(3).next().unwrap();
        assert_eq!(first.to_string(), "127.0.0.1:5277");
    }

    #[test]
    fn test_port_zero_rejected() {
        let mut diag = ConfigDiagnostics::new();
        ServeConfig {
            port: 0,
            ..ServeConfig::default()
        }
        .validate(&mut diag);
        assert_eq!(diag.fields(), vec!["serve.port"]);
    }
}
