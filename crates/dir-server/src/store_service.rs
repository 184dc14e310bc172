use dir_model::RecordRef as ModelRecordRef;
use dir_proto::dir::v1::store_service_server::StoreService;
use dir_proto::dir::v1::{Empty, RecordChunk, RecordMeta, RecordRef};
use futures::Stream;
use std::pin::Pin;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status};

use crate::state::AppState;
use crate::validation::{chrono_to_timestamp, require_non_empty};

pub struct StoreServiceImpl {
    state: AppState,
}

impl StoreServiceImpl {
    pub fn new(state: AppState) -> Self {
        StoreServiceImpl { state }
    }
}

#[tonic::async_trait]
impl StoreService for StoreServiceImpl {
    type PullStream = Pin<Box<dyn Stream<Item = Result<RecordChunk, Status>> + Send + 'static>>;

    /// Reassembles a chunked record, decodes it, and pushes it through C1
    /// validation into C2/C3.
    #[tracing::instrument(skip(self, request))]
    async fn push(&self, request: Request<tonic::Streaming<RecordChunk>>) -> Result<Response<RecordRef>, Status> {
        let mut stream = request.into_inner();
        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk?.data);
        }

        let record = dir_model::decode(&bytes).map_err(|e| Status::invalid_argument(e.to_string()))?;

        let record_ref = self.state.store.push(&record).await?;
        self.state.index.add_record(&record_ref.cid, &record).await?;

        Ok(Response::new(RecordRef { cid: record_ref.cid }))
    }

    /// Streams a record back in `dir_store::CHUNK_SIZE`-byte frames.
    #[tracing::instrument(skip(self))]
    async fn pull(&self, request: Request<RecordRef>) -> Result<Response<Self::PullStream>, Status> {
        let record_ref = request.into_inner();
        require_non_empty(&record_ref.cid, "cid")?;

        let record = self
            .state
            .store
            .pull(&ModelRecordRef { cid: record_ref.cid })
            .await?;
        let bytes = record
            .to_canonical_bytes()
            .map_err(|e| Status::internal(e.to_string()))?;

        let chunks: Vec<Result<RecordChunk, Status>> = bytes
            .chunks(dir_store::CHUNK_SIZE)
            .map(|chunk| Ok(RecordChunk { data: chunk.to_vec() }))
            .collect();

        Ok(Response::new(Box::pin(tokio_stream::iter(chunks))))
    }

    #[tracing::instrument(skip(self))]
    async fn lookup(&self, request: Request<RecordRef>) -> Result<Response<RecordMeta>, Status> {
        let record_ref = request.into_inner();
        require_non_empty(&record_ref.cid, "cid")?;

        let meta = self
            .state
            .store
            .lookup(&ModelRecordRef { cid: record_ref.cid })
            .await?;

        Ok(Response::new(RecordMeta {
            cid: meta.cid,
            annotations: meta.annotations.into_iter().collect(),
            schema_version: meta.schema_version,
            created_at: Some(chrono_to_timestamp(&meta.created_at)),
        }))
    }

    /// Deletes the registry tag and the search index row; the
    /// registry's own garbage collection reclaims the blob afterward.
    #[tracing::instrument(skip(self))]
    async fn delete(&self, request: Request<RecordRef>) -> Result<Response<Empty>, Status> {
        let record_ref = request.into_inner();
        require_non_empty(&record_ref.cid, "cid")?;

        self.state
            .store
            .delete(&ModelRecordRef { cid: record_ref.cid.clone() })
            .await?;
        self.state.index.remove_record(&record_ref.cid).await?;

        Ok(Response::new(Empty {}))
    }
}
