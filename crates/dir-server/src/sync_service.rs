use dir_proto::dir::v1::sync_service_server::SyncService;
use dir_proto::dir::v1::{
    CreateSyncRequest, DeleteSyncRequest, Empty, GetSyncRequest, ListSyncsRequest,
    RequestRegistryCredentialsRequest, RequestRegistryCredentialsResponse, Sync,
    SyncStatus as ProtoStatus,
};
use dir_scheduler::SyncRow;
use futures::Stream;
use std::pin::Pin;
use tonic::{Request, Response, Status};

use crate::state::AppState;
use crate::validation::{chrono_to_timestamp, parse_rfc3339, require_non_empty};

pub struct SyncServiceImpl {
    state: AppState,
    registry_address: String,
}

impl SyncServiceImpl {
    pub fn new(state: AppState, registry_address: String) -> Self {
        SyncServiceImpl { state, registry_address }
    }
}

fn status_from_str(status: &str) -> ProtoStatus {
    match status {
        "pending" => ProtoStatus::Pending,
        "in_progress" => ProtoStatus::InProgress,
        "completed" => ProtoStatus::Completed,
        "failed" => ProtoStatus::Failed,
        "delete_pending" => ProtoStatus::DeletePending,
        "deleted" => ProtoStatus::Deleted,
        _ => ProtoStatus::Unspecified,
    }
}

fn to_proto(row: SyncRow) -> Sync {
    Sync {
        id: row.id,
        status: status_from_str(&row.status) as i32,
        remote_url: row.remote_url,
        error: row.error.unwrap_or_default(),
        created_at: Some(chrono_to_timestamp(&parse_rfc3339(&row.created_at))),
        updated_at: Some(chrono_to_timestamp(&parse_rfc3339(&row.updated_at))),
    }
}

#[tonic::async_trait]
impl SyncService for SyncServiceImpl {
    type ListSyncsStream = Pin<Box<dyn Stream<Item = Result<Sync, Status>> + Send + 'static>>;

    #[tracing::instrument(skip(self, request))]
    async fn create_sync(&self, request: Request<CreateSyncRequest>) -> Result<Response<Sync>, Status> {
        let req = request.into_inner();
        require_non_empty(&req.remote_url, "remote_url")?;
        if req.cids.is_empty() {
            return Err(Status::invalid_argument("cids must not be empty"));
        }

        let id = self.state.syncs.create(&req.remote_url, req.cids).await?;
        let row = self.state.syncs.get(&id).await?;
        Ok(Response::new(to_proto(row)))
    }

    #[tracing::instrument(skip(self))]
    async fn list_syncs(
        &self,
        _request: Request<ListSyncsRequest>,
    ) -> Result<Response<Self::ListSyncsStream>, Status> {
        let rows = self.state.syncs.list().await?;
        let items: Vec<Result<Sync, Status>> = rows.into_iter().map(|row| Ok(to_proto(row))).collect();
        Ok(Response::new(Box::pin(tokio_stream::iter(items))))
    }

    #[tracing::instrument(skip(self))]
    async fn get_sync(&self, request: Request<GetSyncRequest>) -> Result<Response<Sync>, Status> {
        let req = request.into_inner();
        require_non_empty(&req.id, "id")?;
        let row = self.state.syncs.get(&req.id).await?;
        Ok(Response::new(to_proto(row)))
    }

    #[tracing::instrument(skip(self))]
    async fn delete_sync(&self, request: Request<DeleteSyncRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        require_non_empty(&req.id, "id")?;
        self.state.syncs.delete(&req.id).await?;
        Ok(Response::new(Empty {}))
    }

    /// Serves this peer's own registry credentials to a requesting remote
    /// directory. This store only ever runs anonymous, so the
    /// response carries no basic-auth fields.
    #[tracing::instrument(skip(self, request))]
    async fn request_registry_credentials(
        &self,
        request: Request<RequestRegistryCredentialsRequest>,
    ) -> Result<Response<RequestRegistryCredentialsResponse>, Status> {
        let req = request.into_inner();
        require_non_empty(&req.peer_id, "peer_id")?;
        Ok(Response::new(RequestRegistryCredentialsResponse {
            registry_address: self.registry_address.clone(),
            username: String::new(),
            password: String::new(),
        }))
    }
}
