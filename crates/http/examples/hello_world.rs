use http::StatusCode;
use micro_reactor::BoxError;
use micro_reactor::config::ServerConfig;
use micro_reactor_http::handler::{PathParams, make_handler};
use micro_reactor_http::protocol::{HttpRequest, HttpResponse};
use micro_reactor_http::selector;
use micro_reactor_http::server::HttpServer;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    // Initialize logging
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let server = match HttpServer::new(ServerConfig::default()) {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "invalid server config");
            return;
        }
    };

    server.on(selector::get("/").expect("valid pattern"), make_handler(hello_world));
    server.on(selector::get("/hello/{name}").expect("valid pattern"), make_handler(hello_name));
    server.on(selector::post("/echo").expect("valid pattern"), make_handler(echo));

    info!(address = %server.config().address, "starting hello world server");
    if let Err(e) = server.start().await {
        error!(cause = %e, "server stopped");
    }
}

fn hello_world(request: &HttpRequest, _params: &PathParams) -> Result<HttpResponse, BoxError> {
    info!(path = request.uri().path(), "request path");
    Ok(HttpResponse::text(StatusCode::OK, "Hello World!\r\n"))
}

fn hello_name(_request: &HttpRequest, params: &PathParams) -> Result<HttpResponse, BoxError> {
    let name = params.get("name").unwrap_or("stranger");
    Ok(HttpResponse::text(StatusCode::OK, format!("Hello {name}!\r\n")))
}

fn echo(request: &HttpRequest, _params: &PathParams) -> Result<HttpResponse, BoxError> {
    info!(body = %String::from_utf8_lossy(request.body()), content_type = ?request.content_type(), "receiving request body");
    Ok(HttpResponse::new(StatusCode::OK, request.body().clone()))
}
