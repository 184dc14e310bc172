use dir_model::LabelNamespace as ModelNamespace;
use dir_proto::dir::v1::routing_service_server::RoutingService;
use dir_proto::dir::v1::{
    Empty, LabelNamespace as ProtoNamespace, ListItem, ListRequest, PublishRequest, SearchItem,
    SearchRequest, UnpublishRequest,
};
use dir_routing::LabelQuery;
use futures::Stream;
use std::pin::Pin;
use tonic::{Request, Response, Status};

use crate::state::AppState;
use crate::validation::require_non_empty;

pub struct RoutingServiceImpl {
    state: AppState,
}

impl RoutingServiceImpl {
    pub fn new(state: AppState) -> Self {
        RoutingServiceImpl { state }
    }
}

fn to_model_namespace(namespace: i32) -> Result<ModelNamespace, Status> {
    match ProtoNamespace::try_from(namespace).unwrap_or(ProtoNamespace::Unspecified) {
        ProtoNamespace::Skills => Ok(ModelNamespace::Skills),
        ProtoNamespace::Domains => Ok(ModelNamespace::Domains),
        ProtoNamespace::Modules => Ok(ModelNamespace::Modules),
        ProtoNamespace::Locators => Ok(ModelNamespace::Locators),
        ProtoNamespace::Unspecified => Err(Status::invalid_argument("namespace must be set")),
    }
}

#[tonic::async_trait]
impl RoutingService for RoutingServiceImpl {
    type ListStream = Pin<Box<dyn Stream<Item = Result<ListItem, Status>> + Send + 'static>>;
    type SearchStream = Pin<Box<dyn Stream<Item = Result<SearchItem, Status>> + Send + 'static>>;

    /// Pulls each referenced record from the content store, derives its
    /// labels, and announces them on the DHT.
    #[tracing::instrument(skip(self, request))]
    async fn publish(&self, request: Request<PublishRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        if req.record_refs.is_empty() {
            return Err(Status::invalid_argument("record_refs must not be empty"));
        }

        for record_ref in req.record_refs {
            require_non_empty(&record_ref.cid, "cid")?;
            let record = self
                .state
                .store
                .pull(&dir_model::RecordRef { cid: record_ref.cid.clone() })
                .await?;
            let labels = dir_model::extract_labels(&record);
            self.state.routing.publish(&record_ref.cid, &labels).await?;
        }

        Ok(Response::new(Empty {}))
    }

    /// Unpublish only ever accepts `record_refs`.
    #[tracing::instrument(skip(self, request))]
    async fn unpublish(&self, request: Request<UnpublishRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        if req.record_refs.is_empty() {
            return Err(Status::invalid_argument("record_refs must not be empty"));
        }

        for record_ref in req.record_refs {
            require_non_empty(&record_ref.cid, "cid")?;
            let record = self
                .state
                .store
                .pull(&dir_model::RecordRef { cid: record_ref.cid.clone() })
                .await?;
            let labels = dir_model::extract_labels(&record);
            self.state.routing.unpublish(&record_ref.cid, &labels).await?;
        }

        Ok(Response::new(Empty {}))
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, _request: Request<ListRequest>) -> Result<Response<Self::ListStream>, Status> {
        let labels = self.state.routing.list_local()?;
        let items: Vec<Result<ListItem, Status>> =
            labels.into_iter().map(|label| Ok(ListItem { label })).collect();
        Ok(Response::new(Box::pin(tokio_stream::iter(items))))
    }

    #[tracing::instrument(skip(self, request))]
    async fn search(&self, request: Request<SearchRequest>) -> Result<Response<Self::SearchStream>, Status> {
        let req = request.into_inner();
        if req.queries.is_empty() {
            return Err(Status::invalid_argument("queries must not be empty"));
        }

        let mut queries = Vec::with_capacity(req.queries.len());
        for query in req.queries {
            require_non_empty(&query.value, "value")?;
            queries.push(LabelQuery { namespace: to_model_namespace(query.namespace)?, value: query.value });
        }

        let providers = self.state.routing.search(&queries).await?;
        let items: Vec<Result<SearchItem, Status>> = providers
            .into_iter()
            .map(|provider| Ok(SearchItem { peer_id: provider.peer_id, cid: provider.cid }))
            .collect();
        Ok(Response::new(Box::pin(tokio_stream::iter(items))))
    }
}
