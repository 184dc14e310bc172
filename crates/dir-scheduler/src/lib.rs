//! Durable, crash-safe worker-pool schedulers turning queued intent into
//! DHT announcements and remote-to-local record mirroring. Both share the
//! SQLite status-guarded CAS dequeue primitive in `queue` and the jittered
//! poll loop in `worker`.

mod model;
mod publication;
mod queue;
mod sync;
mod worker;

pub use model::{
    validate_remote_url, PublicationRow, PublicationStatus, PublicationTarget, QuerySpec, SyncRow,
    SyncStatus,
};
pub use publication::PublicationScheduler;
pub use sync::{AnonymousCredentials, RegistryCredentials, RemoteCredentials, SyncScheduler};
pub use worker::run_poll_loop;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
