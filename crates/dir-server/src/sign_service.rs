use dir_proto::dir::v1::sign_service_server::SignService;
use dir_proto::dir::v1::{RecordRef, SignRequest, SignResponse, VerifyResponse};
use tonic::{Request, Response, Status};

use crate::state::AppState;
use crate::validation::require_non_empty;

pub struct SignServiceImpl {
    state: AppState,
}

impl SignServiceImpl {
    pub fn new(state: AppState) -> Self {
        SignServiceImpl { state }
    }
}

#[tonic::async_trait]
impl SignService for SignServiceImpl {
    /// Signing requires a local signing key this directory does not hold;
    /// client-side signing + `Push`ing the signature as a referrer is the
    /// supported path.
    async fn sign(&self, _request: Request<SignRequest>) -> Result<Response<SignResponse>, Status> {
        Err(Status::unimplemented("signing is performed client-side"))
    }

    /// Walks the record's referrer artifacts for a signature; `Verify`
    /// succeeds iff at least one signature artifact is attached.
    #[tracing::instrument(skip(self, request))]
    async fn verify(&self, request: Request<RecordRef>) -> Result<Response<VerifyResponse>, Status> {
        let record_ref = request.into_inner();
        require_non_empty(&record_ref.cid, "cid")?;

        let referrers = self
            .state
            .store
            .walk_referrers(
                &dir_model::RecordRef { cid: record_ref.cid },
                Some(dir_store::SIGNATURE_ARTIFACT_TYPE),
            )
            .await?;

        if referrers.is_empty() {
            return Ok(Response::new(VerifyResponse {
                success: false,
                reason: "no signature artifact attached to this record".to_string(),
            }));
        }

        Ok(Response::new(VerifyResponse { success: true, reason: String::new() }))
    }
}
