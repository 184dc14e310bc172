use std::collections::HashSet;
use std::time::{Duration, SystemTime};

use dir_error::Error;
use dir_model::{Label, LabelNamespace};
use futures::channel::oneshot;
use futures::StreamExt;
use libp2p::kad::{self, QueryId, QueryResult};
use libp2p::swarm::SwarmEvent;
use libp2p::{identify, identity, noise, ping, tcp, yamux, Multiaddr, PeerId, Swarm};
use tokio::sync::mpsc as tmpsc;

use crate::behaviour::{DirectoryBehaviour, DirectoryBehaviourEvent, PROTOCOL_VERSION};
use crate::key::DhtKey;
use crate::metadata::{LabelMetadata, MetadataStore};

/// A found provider, as returned by `Search`: the peer that
/// announced `cid` under the queried label, de-duplicated by
/// `(peer_id, cid)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Provider {
    pub peer_id: String,
    pub cid: String,
}

/// A single search query: a label type plus a value that may contain `*`
/// wildcard segments.
#[derive(Debug, Clone)]
pub struct LabelQuery {
    pub namespace: LabelNamespace,
    pub value: String,
}

enum Command {
    StartProviding { key: kad::RecordKey, reply: oneshot::Sender<Result<(), Error>> },
    StopProviding { key: kad::RecordKey },
    GetProviders { key: kad::RecordKey, reply: oneshot::Sender<HashSet<PeerId>> },
    Bootstrap,
    Stop,
}

/// Owns the libp2p `Swarm` and runs its event loop on a dedicated task.
/// All public operations go through an mpsc command channel so the swarm
/// itself never leaves its owning task, since `libp2p::Swarm` isn't `Sync`.
pub struct RoutingHost {
    local_peer_id: PeerId,
    commands: tmpsc::Sender<Command>,
    metadata: MetadataStore,
    refresh_interval: Duration,
    stale_after: Duration,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl RoutingHost {
    pub async fn start(
        listen_address: &str,
        bootstrap_peers: &[String],
        refresh_interval: Duration,
        stale_after: Duration,
        metadata_db: &sled::Db,
    ) -> Result<Self, Error> {
        let keypair = identity::Keypair::generate_ed25519();
        let local_peer_id = PeerId::from(keypair.public());

        let mut swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)
            .map_err(|e| Error::internal(e.to_string()))?
            .with_behaviour(|key| {
                let store = kad::store::MemoryStore::new(key.public().to_peer_id());
                let mut kad_config = kad::Config::default();
                kad_config.set_protocol_names(vec![PROTOCOL_VERSION.into()]);
                let kademlia = kad::Behaviour::with_config(key.public().to_peer_id(), store, kad_config);
                let identify = identify::Behaviour::new(identify::Config::new(
                    PROTOCOL_VERSION.to_string(),
                    key.public(),
                ));
                let ping = ping::Behaviour::default();
                DirectoryBehaviour { kademlia, identify, ping }
            })
            .map_err(|e| Error::internal(e.to_string()))?
            .build();

        let listen_addr: Multiaddr = listen_address
            .parse()
            .map_err(|_| Error::invalid_argument(format!("invalid listen address: {listen_address}")))?;
        swarm.listen_on(listen_addr).map_err(|e| Error::internal(e.to_string()))?;

        for peer_addr in bootstrap_peers {
            let addr: Multiaddr = peer_addr
                .parse()
                .map_err(|_| Error::invalid_argument(format!("invalid bootstrap peer: {peer_addr}")))?;
            if let Some(libp2p::multiaddr::Protocol::P2p(peer_id)) = addr.iter().last() {
                swarm.behaviour_mut().kademlia.add_address(&peer_id, addr);
            }
        }
        if !bootstrap_peers.is_empty() {
            let _ = swarm.behaviour_mut().kademlia.bootstrap();
        }

        let (tx, rx) = tmpsc::channel(256);
        let metadata = MetadataStore::open(metadata_db)?;
        let task = tokio::spawn(run_event_loop(swarm, rx));

        Ok(RoutingHost {
            local_peer_id,
            commands: tx,
            metadata,
            refresh_interval,
            stale_after,
            task: Some(task),
        })
    }

    pub fn local_peer_id(&self) -> String {
        self.local_peer_id.to_string()
    }

    /// `Publish(record)`: announces every label as a provider record and
    /// records `LabelMetadata` locally. Idempotent.
    #[tracing::instrument(skip(self, labels))]
    pub async fn publish(&self, cid: &str, labels: &[Label]) -> Result<(), Error> {
        for label in labels {
            let dht_key = DhtKey::new(
                label.namespace,
                label.value.split('/').map(str::to_string).collect(),
                cid.to_string(),
                self.local_peer_id(),
            );
            let record_key = provider_key(label.namespace, &label.value, cid);
            let (reply_tx, reply_rx) = oneshot::channel();
            self.commands
                .send(Command::StartProviding { key: record_key, reply: reply_tx })
                .await
                .map_err(|_| Error::unavailable("routing host stopped"))?;
            reply_rx
                .await
                .map_err(|_| Error::unavailable("routing host stopped"))??;

            self.metadata.put(&dht_key.to_string(), LabelMetadata::new(SystemTime::now()))?;
            tracing::info!(label = %dht_key, "announced label on DHT");
        }
        Ok(())
    }

    /// `Unpublish(record)`: ceases re-announcement.
    /// Idempotent: unpublishing an unknown record is a no-op.
    pub async fn unpublish(&self, cid: &str, labels: &[Label]) -> Result<(), Error> {
        for label in labels {
            let dht_key = DhtKey::new(
                label.namespace,
                label.value.split('/').map(str::to_string).collect(),
                cid.to_string(),
                self.local_peer_id(),
            );
            let record_key = provider_key(label.namespace, &label.value, cid);
            let _ = self.commands.send(Command::StopProviding { key: record_key }).await;
            self.metadata.remove(&dht_key.to_string())?;
        }
        Ok(())
    }

    /// `Search(request)`: resolves each query against the DHT, merging
    /// and de-duplicating by `(peer_id, cid)`. Wildcarded
    /// values are matched against locally-known announced labels before
    /// querying providers, since a Kademlia key space can't be
    /// prefix-scanned directly.
    pub async fn search(&self, queries: &[LabelQuery]) -> Result<Vec<Provider>, Error> {
        let mut seen: HashSet<Provider> = HashSet::new();
        let mut out = Vec::new();

        for query in queries {
            let candidates = self.resolve_candidates(query)?;
            for (value, cid) in candidates {
                let record_key = provider_key(query.namespace, &value, &cid);
                let (reply_tx, reply_rx) = oneshot::channel();
                self.commands
                    .send(Command::GetProviders { key: record_key, reply: reply_tx })
                    .await
                    .map_err(|_| Error::unavailable("routing host stopped"))?;
                let providers = reply_rx.await.map_err(|_| Error::unavailable("routing host stopped"))?;
                for peer in providers {
                    let provider = Provider { peer_id: peer.to_string(), cid: cid.clone() };
                    if seen.insert(provider.clone()) {
                        out.push(provider);
                    }
                }
            }
        }
        Ok(out)
    }

    /// `List`: the local-only variant, enumerating labels this peer has
    /// announced.
    pub fn list_local(&self) -> Result<Vec<String>, Error> {
        Ok(self.metadata.iter_all()?.into_iter().map(|(key, _)| key).collect())
    }

    /// Expands a (possibly wildcarded) query value against the local
    /// metadata store's announced label keys. Exact, non-wildcarded
    /// values pass through unchanged; we still don't know the CID a
    /// caller is searching for in the general case, so exact queries
    /// without a known local CID are matched against every CID announced
    /// locally under that label, mirroring how this peer would have
    /// learned of it via its own local index.
    fn resolve_candidates(&self, query: &LabelQuery) -> Result<Vec<(String, String)>, Error> {
        let pattern = query.value.replace('*', "");
        let wildcarded = query.value.contains('*');
        let mut out = Vec::new();
        for (raw_key, _) in self.metadata.iter_all()? {
            let Ok(key) = DhtKey::parse(&raw_key) else { continue };
            if key.namespace != query.namespace {
                continue;
            }
            let path = key.label_path();
            let matches = if wildcarded { path.starts_with(&pattern) } else { path == query.value };
            if matches {
                out.push((path, key.cid));
            }
        }
        Ok(out)
    }

    /// Re-announces every locally-held label whose `last_seen` is within
    /// the TTL, and garbage-collects entries past `stale_after` so they
    /// stop being re-announced. Intended to be
    /// driven by a periodic tick from the caller (the publication/sync
    /// binary's main loop), not spawned internally, so tests can drive it
    /// deterministically.
    pub async fn refresh_tick(&self) -> Result<(), Error> {
        let now = SystemTime::now();
        for (raw_key, meta) in self.metadata.iter_all()? {
            if meta.is_stale(self.stale_after, now) {
                self.metadata.remove(&raw_key)?;
                if let Ok(key) = DhtKey::parse(&raw_key) {
                    let record_key = provider_key(key.namespace, &key.label_path(), &key.cid);
                    let _ = self.commands.send(Command::StopProviding { key: record_key }).await;
                }
                tracing::debug!(label = %raw_key, "garbage-collected stale label");
                continue;
            }
            if let Ok(key) = DhtKey::parse(&raw_key) {
                let record_key = provider_key(key.namespace, &key.label_path(), &key.cid);
                let (reply_tx, reply_rx) = oneshot::channel();
                if self
                    .commands
                    .send(Command::StartProviding { key: record_key, reply: reply_tx })
                    .await
                    .is_ok()
                {
                    if reply_rx.await.is_ok() {
                        let mut refreshed = meta;
                        refreshed.touch(now);
                        self.metadata.put(&raw_key, refreshed)?;
                    }
                }
            }
        }
        let _ = self.commands.send(Command::Bootstrap).await;
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Graceful shutdown: halts the refresher (by the caller no longer
    /// invoking `refresh_tick`) and closes the swarm event loop.
    pub async fn stop(mut self) {
        let _ = self.commands.send(Command::Stop).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

fn provider_key(namespace: LabelNamespace, path: &str, cid: &str) -> kad::RecordKey {
    kad::RecordKey::new(&format!("/{namespace}/{path}/{cid}"))
}

async fn run_event_loop(mut swarm: Swarm<DirectoryBehaviour>, mut commands: tmpsc::Receiver<Command>) {
    let mut pending_start: std::collections::HashMap<QueryId, oneshot::Sender<Result<(), Error>>> =
        std::collections::HashMap::new();
    let mut pending_get: std::collections::HashMap<QueryId, (oneshot::Sender<HashSet<PeerId>>, HashSet<PeerId>)> =
        std::collections::HashMap::new();

    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(Command::StartProviding { key, reply }) => {
                        match swarm.behaviour_mut().kademlia.start_providing(key) {
                            Ok(query_id) => { pending_start.insert(query_id, reply); }
                            Err(e) => { let _ = reply.send(Err(Error::internal(e.to_string()))); }
                        }
                    }
                    Some(Command::StopProviding { key }) => {
                        swarm.behaviour_mut().kademlia.stop_providing(&key);
                    }
                    Some(Command::GetProviders { key, reply }) => {
                        let query_id = swarm.behaviour_mut().kademlia.get_providers(key);
                        pending_get.insert(query_id, (reply, HashSet::new()));
                    }
                    Some(Command::Bootstrap) => {
                        let _ = swarm.behaviour_mut().kademlia.bootstrap();
                    }
                    Some(Command::Stop) | None => break,
                }
            }
            event = swarm.select_next_some() => {
                if let SwarmEvent::Behaviour(DirectoryBehaviourEvent::Kademlia(kad_event)) = event {
                    handle_kad_event(kad_event, &mut pending_start, &mut pending_get);
                }
            }
        }
    }
}

fn handle_kad_event(
    event: kad::Event,
    pending_start: &mut std::collections::HashMap<QueryId, oneshot::Sender<Result<(), Error>>>,
    pending_get: &mut std::collections::HashMap<QueryId, (oneshot::Sender<HashSet<PeerId>>, HashSet<PeerId>)>,
) {
    if let kad::Event::OutboundQueryProgressed { id, result, step, .. } = event {
        match result {
            QueryResult::StartProviding(result) => {
                if let Some(reply) = pending_start.remove(&id) {
                    let _ = reply.send(result.map(|_| ()).map_err(|e| Error::internal(e.to_string())));
                }
            }
            QueryResult::GetProviders(Ok(kad::GetProvidersOk::FoundProviders { providers, .. })) => {
                if let Some((_, set)) = pending_get.get_mut(&id) {
                    set.extend(providers);
                }
                if step.last {
                    if let Some((reply, set)) = pending_get.remove(&id) {
                        let _ = reply.send(set);
                    }
                }
            }
            QueryResult::GetProviders(Ok(kad::GetProvidersOk::FinishedWithNoAdditionalRecord { .. })) => {
                if step.last {
                    if let Some((reply, set)) = pending_get.remove(&id) {
                        let _ = reply.send(set);
                    }
                }
            }
            QueryResult::GetProviders(Err(_)) => {
                if let Some((reply, set)) = pending_get.remove(&id) {
                    let _ = reply.send(set);
                }
            }
            _ => {}
        }
    }
}
