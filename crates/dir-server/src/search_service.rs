use dir_index::{Filter, Page};
use dir_proto::dir::v1::search_filter::Category;
use dir_proto::dir::v1::search_service_server::SearchService;
use dir_proto::dir::v1::{IndexSearchRequest, IndexSearchResponse, SearchFilter};
use futures::Stream;
use std::pin::Pin;
use tonic::{Request, Response, Status};

use crate::state::AppState;

pub struct SearchServiceImpl {
    state: AppState,
}

impl SearchServiceImpl {
    pub fn new(state: AppState) -> Self {
        SearchServiceImpl { state }
    }
}

fn to_filter(filter: SearchFilter) -> Result<Filter, Status> {
    match filter.category {
        Some(Category::Name(list)) => Ok(Filter::Name(list.values)),
        Some(Category::Version(list)) => Ok(Filter::Version(list.values)),
        Some(Category::SkillId(list)) => Ok(Filter::SkillId(list.values)),
        Some(Category::SkillName(list)) => Ok(Filter::SkillName(list.values)),
        Some(Category::LocatorType(list)) => Ok(Filter::LocatorType(list.values)),
        Some(Category::LocatorUrl(list)) => Ok(Filter::LocatorUrl(list.values)),
        Some(Category::ModuleName(list)) => Ok(Filter::ModuleName(list.values)),
        Some(Category::ModuleVersion(list)) => Ok(Filter::ModuleVersion(list.values)),
        None => Err(Status::invalid_argument("filter must set a category")),
    }
}

#[tonic::async_trait]
impl SearchService for SearchServiceImpl {
    type SearchStream = Pin<Box<dyn Stream<Item = Result<IndexSearchResponse, Status>> + Send + 'static>>;

    #[tracing::instrument(skip(self, request))]
    async fn search(
        &self,
        request: Request<IndexSearchRequest>,
    ) -> Result<Response<Self::SearchStream>, Status> {
        let req = request.into_inner();
        let filters = req
            .filters
            .into_iter()
            .map(to_filter)
            .collect::<Result<Vec<_>, _>>()?;

        let page = Page {
            limit: if req.limit > 0 { Some(req.limit) } else { None },
            offset: if req.offset > 0 { Some(req.offset) } else { None },
        };

        let rows = self.state.index.get_records(&filters, page).await?;
        let items: Vec<Result<IndexSearchResponse, Status>> = rows
            .into_iter()
            .map(|row| {
                Ok(IndexSearchResponse {
                    cid: row.cid,
                    name: row.name,
                    version: row.version,
                })
            })
            .collect();

        Ok(Response::new(Box::pin(tokio_stream::iter(items))))
    }
}
