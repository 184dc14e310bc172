//! Peer-to-peer label routing and discovery over a Kademlia DHT. Publishes
//! the labels of locally-stored records as provider records and resolves
//! search queries against the same overlay.

mod behaviour;
mod host;
mod key;
mod metadata;
mod validators;

pub use host::{LabelQuery, Provider, RoutingHost};
pub use key::{DhtKey, KeyError};
pub use metadata::{LabelMetadata, MetadataStore};
pub use validators::{select, NoValidValues, Validator};

pub use dir_model::LabelNamespace;
