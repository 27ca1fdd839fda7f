use std::{
    fs::File,
    io::{self, BufReader},
    net::{Ipv4Addr, SocketAddr},
    path::Path,
};

use serde::{Deserialize, Serialize};

/// Configuration of networked multi-party transport.
/// The first entry describes party 1.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub parties: Vec<NetworkPartyConfig>,
}

/// Details about party in networked multiparty protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPartyConfig {
    pub address: SocketAddr,
}

impl NetworkConfig {
    /// Load configuration from JSON file.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Parties listening on consecutive localhost ports starting at `base_port`.
    pub fn localhost(num_parties: usize, base_port: u16) -> Self {
        Self {
            parties: (0..num_parties)
                .map(|index| NetworkPartyConfig {
                    address: SocketAddr::from((Ipv4Addr::LOCALHOST, base_port + index as u16)),
                })
                .collect(),
        }
    }

    pub fn num_parties(&self) -> usize {
        self.parties.len()
    }
}
