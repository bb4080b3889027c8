use std::io;
use std::sync::Arc;

use arc_swap::ArcSwap;
use may_minihttp::{HttpService, Request, Response};
use tracing::{info, warn};

use super::request::parse_request;
use super::response::write_response;
use crate::context::RequestContext;
use crate::dispatcher::{FinalResponse, Pipeline};
use crate::error::HttpError;

/// `may_minihttp` service driving a frozen [`Pipeline`].
///
/// The pipeline sits behind an `ArcSwap`: every request loads the current
/// one without locking, and [`DispatchService::replace`] swaps in a newly
/// frozen pipeline while in-flight requests finish on the old one.
#[derive(Clone)]
pub struct DispatchService {
    pipeline: Arc<ArcSwap<Pipeline>>,
}

impl DispatchService {
    #[must_use]
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(ArcSwap::from_pointee(pipeline)),
        }
    }

    /// The pipeline serving new requests right now.
    #[must_use]
    pub fn current(&self) -> Arc<Pipeline> {
        self.pipeline.load_full()
    }

    /// Serve subsequent requests with `pipeline`.
    pub fn replace(&self, pipeline: Pipeline) {
        info!(routes = pipeline.router().len(), "Replacing dispatch pipeline");
        self.pipeline.store(Arc::new(pipeline));
    }

    /// Run an already parsed context through the current pipeline.
    pub fn serve(&self, ctx: &mut RequestContext) -> FinalResponse {
        self.pipeline.load().handle(ctx)
    }
}

impl HttpService for DispatchService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let pipeline = self.pipeline.load();

        let request = match parse_request(req) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "Rejecting request with invalid method");
                let error = HttpError::with_message(http::StatusCode::BAD_REQUEST, "Invalid method");
                let mut bad = FinalResponse::internal_error();
                bad.status = error.status();
                bad.body = serde_json::to_vec(error.body()).unwrap_or_default();
                write_response(res, bad);
                return Ok(());
            }
        };

        let mut ctx = pipeline.context_for(request);
        let response = pipeline.handle(&mut ctx);
        write_response(res, response);
        Ok(())
    }
}
