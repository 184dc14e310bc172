//! gRPC façade exposing the directory core's six services over
//! the C1-C6 components, plus the server binary's wiring (`main.rs`).

mod publication_service;
mod routing_service;
mod search_service;
mod sign_service;
mod state;
mod store_service;
mod sync_service;
mod validation;

pub use publication_service::PublicationServiceImpl;
pub use routing_service::RoutingServiceImpl;
pub use search_service::SearchServiceImpl;
pub use sign_service::SignServiceImpl;
pub use state::AppState;
pub use store_service::StoreServiceImpl;
pub use sync_service::SyncServiceImpl;
