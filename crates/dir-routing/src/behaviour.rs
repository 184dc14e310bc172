use libp2p::kad;
use libp2p::swarm::NetworkBehaviour;
use libp2p::{identify, ping};

/// The routing host's libp2p protocol set: Kademlia for the label DHT,
/// Identify so peers exchange listen addresses, Ping for liveness.
#[derive(NetworkBehaviour)]
pub struct DirectoryBehaviour {
    pub kademlia: kad::Behaviour<kad::store::MemoryStore>,
    pub identify: identify::Behaviour,
    pub ping: ping::Behaviour,
}

pub const PROTOCOL_VERSION: &str = "/agent-directory/kad/1.0.0";
