use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use http::StatusCode;
use serde_json::json;
use switchyard::context::RequestContext;
use switchyard::handler::{
    Controller, ControllerRegistry, ControllerResolver, HandlerRef, HandlerResult,
};
use switchyard::logging::init_logging;
use switchyard::middleware::{MetricsMiddleware, TracingMiddleware};
use switchyard::server::{apply_runtime_config, DispatchService, HttpServer};
use switchyard::{HttpError, Matcher, Middleware, PipelineBuilder, Route, Router, RuntimeConfig};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "switchyard-demo")]
#[command(about = "Serve a handful of demo routes through a switchyard pipeline", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080", env = "SWITCHYARD_ADDR")]
    addr: String,

    /// Optional YAML runtime config; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the route table before serving
    #[arg(long, default_value_t = false)]
    dump_routes: bool,
}

struct PostsController;

impl Controller for PostsController {
    fn call(&self, method: &str, ctx: &mut RequestContext) -> HandlerResult {
        match method {
            "index" => Ok(Some(json!({ "posts": [1, 2, 3] }).into())),
            "show" => Ok(Some(json!({ "id": ctx.param("id") }).into())),
            other => Err(HttpError::with_message(
                StatusCode::NOT_IMPLEMENTED,
                &format!("PostsController has no \"{other}\" method"),
            )),
        }
    }
}

fn build_router(controllers: &Arc<ControllerRegistry>) -> anyhow::Result<Router> {
    let resolver: Arc<dyn ControllerResolver> = Arc::<ControllerRegistry>::clone(controllers);
    let mut router = Router::new();

    router.add(
        Route::get("/health", HandlerRef::function(|_ctx| Ok(Some("ok".into())))).name("health"),
    )?;
    router.add(
        Route::get(
            "/posts",
            HandlerRef::controller(Arc::clone(&resolver), "PostsController", "index"),
        )
        .name("posts.index"),
    )?;
    router.add(
        Route::get(
            "/posts/:id",
            HandlerRef::controller(Arc::clone(&resolver), "PostsController", "show"),
        )
        .name("posts.show")
        .matcher("id", Matcher::number()),
    )?;
    router.add(
        Route::get(
            "/files/*path",
            HandlerRef::function(|ctx| Ok(Some(json!({ "path": ctx.param("path") }).into()))),
        )
        .name("files"),
    )?;
    router.add(
        Route::get(
            "/dashboard",
            HandlerRef::function(|ctx| {
                Ok(Some(json!({ "tenant": ctx.subdomain("tenant") }).into()))
            }),
        )
        .domain(":tenant.example.com")
        .name("tenant.dashboard"),
    )?;

    Ok(router)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging()?;

    let config = RuntimeConfig::load(cli.config.as_deref())?;
    apply_runtime_config(&config);

    let controllers = Arc::new(ControllerRegistry::new());
    controllers.register("PostsController", PostsController);

    let router = build_router(&controllers)?;
    if cli.dump_routes {
        router.dump_routes();
    }

    let metrics = Arc::new(MetricsMiddleware::new());
    let metrics_layer: Arc<dyn Middleware> = Arc::<MetricsMiddleware>::clone(&metrics);
    let pipeline = PipelineBuilder::new(router)
        .with_config(config)
        .middleware(Arc::new(TracingMiddleware))
        .middleware(metrics_layer)
        .after(|ctx| {
            let request_id = ctx.request_id.to_string();
            ctx.response.set_header("x-request-id", &request_id);
            Ok(())
        })
        .freeze();

    let handle = HttpServer(DispatchService::new(pipeline)).start(cli.addr.as_str())?;
    info!(addr = %handle.addr(), "switchyard-demo listening");
    if handle.join().is_err() {
        warn!(
            requests = metrics.request_count(),
            errors = metrics.error_count(),
            "Server stopped after a panic"
        );
    }
    Ok(())
}
