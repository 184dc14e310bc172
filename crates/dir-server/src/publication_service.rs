use dir_proto::dir::v1::publication_service_server::PublicationService;
use dir_proto::dir::v1::search_filter::Category;
use dir_proto::dir::v1::{
    CreatePublicationRequest, GetPublicationRequest, ListPublicationsRequest, Publication,
    PublicationStatus as ProtoStatus, SearchFilter,
};
use dir_scheduler::{PublicationRow, PublicationTarget, QuerySpec};
use futures::Stream;
use std::pin::Pin;
use tonic::{Request, Response, Status};

use crate::state::AppState;
use crate::validation::parse_rfc3339;

pub struct PublicationServiceImpl {
    state: AppState,
}

impl PublicationServiceImpl {
    pub fn new(state: AppState) -> Self {
        PublicationServiceImpl { state }
    }
}

fn to_query_spec(filter: SearchFilter) -> Result<QuerySpec, Status> {
    match filter.category {
        Some(Category::Name(list)) => Ok(QuerySpec::Name(list.values)),
        Some(Category::Version(list)) => Ok(QuerySpec::Version(list.values)),
        Some(Category::SkillId(list)) => Ok(QuerySpec::SkillId(list.values)),
        Some(Category::SkillName(list)) => Ok(QuerySpec::SkillName(list.values)),
        Some(Category::LocatorType(list)) => Ok(QuerySpec::LocatorType(list.values)),
        Some(Category::LocatorUrl(list)) => Ok(QuerySpec::LocatorUrl(list.values)),
        Some(Category::ModuleName(list)) => Ok(QuerySpec::ModuleName(list.values)),
        Some(Category::ModuleVersion(list)) => Ok(QuerySpec::ModuleVersion(list.values)),
        None => Err(Status::invalid_argument("filter must set a category")),
    }
}

fn status_from_str(status: &str) -> ProtoStatus {
    match status {
        "pending" => ProtoStatus::Pending,
        "in_progress" => ProtoStatus::InProgress,
        "completed" => ProtoStatus::Completed,
        "failed" => ProtoStatus::Failed,
        _ => ProtoStatus::Unspecified,
    }
}

fn to_proto(row: PublicationRow) -> Publication {
    Publication {
        id: row.id,
        status: status_from_str(&row.status) as i32,
        error: row.error.unwrap_or_default(),
        created_at: Some(crate::validation::chrono_to_timestamp(&parse_rfc3339(&row.created_at))),
        updated_at: Some(crate::validation::chrono_to_timestamp(&parse_rfc3339(&row.updated_at))),
    }
}

#[tonic::async_trait]
impl PublicationService for PublicationServiceImpl {
    type ListPublicationsStream = Pin<Box<dyn Stream<Item = Result<Publication, Status>> + Send + 'static>>;

    /// Exactly one of `record_refs`, `queries`, or `all_records` must be
    /// set; empty collections are rejected.
    #[tracing::instrument(skip(self, request))]
    async fn create_publication(
        &self,
        request: Request<CreatePublicationRequest>,
    ) -> Result<Response<Publication>, Status> {
        let req = request.into_inner();
        let set_count = [!req.record_refs.is_empty(), !req.queries.is_empty(), req.all_records]
            .iter()
            .filter(|set| **set)
            .count();
        if set_count != 1 {
            return Err(Status::invalid_argument(
                "exactly one of record_refs, queries, or all_records must be set",
            ));
        }

        let target = if req.all_records {
            PublicationTarget::AllRecords
        } else if !req.record_refs.is_empty() {
            PublicationTarget::RecordRefs(req.record_refs)
        } else {
            let specs = req
                .queries
                .into_iter()
                .map(to_query_spec)
                .collect::<Result<Vec<_>, _>>()?;
            PublicationTarget::Queries(specs)
        };

        let id = self.state.publications.create(target).await?;
        let row = self.state.publications.get(&id).await?;
        Ok(Response::new(to_proto(row)))
    }

    #[tracing::instrument(skip(self))]
    async fn list_publications(
        &self,
        _request: Request<ListPublicationsRequest>,
    ) -> Result<Response<Self::ListPublicationsStream>, Status> {
        let rows = self.state.publications.list().await?;
        let items: Vec<Result<Publication, Status>> = rows.into_iter().map(|row| Ok(to_proto(row))).collect();
        Ok(Response::new(Box::pin(tokio_stream::iter(items))))
    }

    #[tracing::instrument(skip(self))]
    async fn get_publication(
        &self,
        request: Request<GetPublicationRequest>,
    ) -> Result<Response<Publication>, Status> {
        let req = request.into_inner();
        crate::validation::require_non_empty(&req.id, "id")?;
        let row = self.state.publications.get(&req.id).await?;
        Ok(Response::new(to_proto(row)))
    }
}
