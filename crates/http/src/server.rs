//! An HTTP/1.1 server on top of the reactor bus.
//!
//! Every decoded request is matched against the registered routes in registration
//! order. The first route whose selector matches gets the request; its handler runs on
//! the configured dispatcher and answers through the connection's reply handle.
//! Responses leave the connection in request order, so pipelined requests work as
//! expected.
//!
//! - no matching route: `404 Not Found`
//! - the handler failed, or the dispatcher refused the task: `500 Internal Server Error`
//! - the request asked to close the connection: the response says so and the connection
//!   closes once it is written

use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use micro_reactor::BoxError;
use micro_reactor::bus::{Bus, Consumer};
use micro_reactor::config::ServerConfig;
use micro_reactor::connection::{CONNECTION_ID_HEADER, ConnectionId, Exchange, FrameHandler, Reply};
use micro_reactor::event::Event;
use micro_reactor::registry::RegistrationId;
use micro_reactor::selector::{Selector, SelectorKey};
use micro_reactor::server::{ServerError, TcpServer};
use tracing::{debug, error, trace};

use crate::codec::HttpCodec;
use crate::handler::{PathParams, RequestHandler, not_found};
use crate::protocol::{HttpRequest, HttpResponse};

/// A request together with the handle its response is sent through.
pub type HttpExchange = Exchange<HttpRequest, HttpResponse>;

/// Routes requests to [`RequestHandler`]s and serves them over TCP.
pub struct HttpServer {
    config: ServerConfig,
    bus: Arc<Bus<HttpExchange>>,
}

impl HttpServer {
    /// Validates `config` and builds the dispatcher it names.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let bus = Arc::new(Bus::from_config(&config.dispatcher)?);
        Ok(Self { config, bus })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Adds a route. Routes registered earlier win when several match.
    pub fn on<H>(&self, selector: Selector, handler: H) -> RegistrationId
    where
        H: RequestHandler + 'static,
    {
        self.bus.on(selector.clone(), HandlerConsumer { selector, handler })
    }

    pub fn bus(&self) -> &Arc<Bus<HttpExchange>> {
        &self.bus
    }

    /// A TCP server that decodes HTTP on every connection and feeds this server's routes.
    pub fn tcp_server(&self) -> Result<TcpServer<impl Fn() -> HttpCodec + use<>, HttpFrameHandler>, ServerError> {
        let buffer_config = self.config.connection.buffer;
        let handler = Arc::new(HttpFrameHandler { bus: Arc::clone(&self.bus) });
        TcpServer::new(self.config.clone(), move || HttpCodec::new(buffer_config), handler)
    }

    /// Binds the configured address and serves until the process ends.
    pub async fn start(&self) -> Result<(), ServerError> {
        self.tcp_server()?.start().await
    }
}

impl fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServer").field("address", &self.config.address).field("bus", &self.bus).finish()
    }
}

/// Hands each decoded request to the first route that selects it.
#[derive(Debug)]
pub struct HttpFrameHandler {
    bus: Arc<Bus<HttpExchange>>,
}

impl FrameHandler<HttpRequest, HttpResponse> for HttpFrameHandler {
    fn on_frame(&self, connection: ConnectionId, request: HttpRequest, reply: Reply<HttpResponse>) {
        let mut registrations = self.bus.registry().resolve(&request);
        if registrations.is_empty() {
            trace!(%connection, path = request.uri().path(), "no route matched");
            let response = if request.header().wants_close() { not_found().close() } else { not_found() };
            if let Err(e) = reply.send(response) {
                debug!(%connection, cause = %e, "response not delivered");
            }
            return;
        }
        registrations.truncate(1);

        let event = Event::new(Exchange::new(request, reply)).with_header(CONNECTION_ID_HEADER, connection.to_string());
        // a refused task drops the exchange, and with it the reply
        if self.bus.dispatch_to(registrations, connection.dispatch_key(), event) == 0 {
            debug!(%connection, "request was not dispatched");
        }
    }
}

struct HandlerConsumer<H> {
    selector: Selector,
    handler: H,
}

impl<H: RequestHandler> Consumer<HttpExchange> for HandlerConsumer<H> {
    fn handle(&self, event: &Event<HttpExchange>) -> Result<(), BoxError> {
        let exchange = event.data();
        let request = exchange.value();
        let params = PathParams::new(self.selector.path_params(SelectorKey::path(request)).unwrap_or_default());

        let (response, outcome) = match self.handler.handle(request, &params) {
            Ok(response) => (response, Ok(())),
            Err(e) => {
                error!(cause = %e, path = request.uri().path(), "handler failed");
                (HttpResponse::status_only(StatusCode::INTERNAL_SERVER_ERROR), Err(e))
            }
        };

        let response = if request.header().wants_close() { response.close() } else { response };
        if let Err(e) = exchange.reply().send(response) {
            debug!(connection = %exchange.reply().connection(), cause = %e, "response not delivered");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use indoc::indoc;
    use micro_reactor::config::{BufferConfig, ConnectionConfig, DispatcherConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;
    use crate::handler::make_handler;
    use crate::selector;

    fn local_config() -> ServerConfig {
        ServerConfig { address: "127.0.0.1:0".to_owned(), ..ServerConfig::default() }
    }

    fn routes(server: &HttpServer) {
        server.on(
            selector::get("/hello/{name}").unwrap(),
            make_handler(|_request: &HttpRequest, params: &PathParams| -> Result<HttpResponse, BoxError> {
                Ok(HttpResponse::text(StatusCode::OK, format!("hello {}", params.get("name").unwrap_or_default())))
            }),
        );
        server.on(
            selector::post("/echo").unwrap(),
            make_handler(|request: &HttpRequest, _params: &PathParams| -> Result<HttpResponse, BoxError> {
                Ok(HttpResponse::new(StatusCode::OK, request.body().clone()))
            }),
        );
        server.on(
            selector::get("/fail").unwrap(),
            make_handler(|_request: &HttpRequest, _params: &PathParams| -> Result<HttpResponse, BoxError> {
                Err("handler exploded".into())
            }),
        );
    }

    /// Sends `raw` on a fresh connection and reads until the server closes it.
    async fn exchange(server: HttpServer, raw: &str) -> String {
        let tcp_server = Arc::new(server.tcp_server().unwrap());
        let listener = tcp_server.bind().await.unwrap();
        let address = listener.local_addr().unwrap();

        let serving = Arc::clone(&tcp_server);
        let accept_loop = tokio::spawn(async move { serving.serve(listener).await });

        let mut stream = TcpStream::connect(address).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();

        let mut received = String::new();
        stream.read_to_string(&mut received).await.unwrap();

        tcp_server.shutdown();
        accept_loop.await.unwrap();
        received
    }

    fn server_with_routes(config: ServerConfig) -> HttpServer {
        let server = HttpServer::new(config).unwrap();
        routes(&server);
        server
    }

    #[tokio::test]
    async fn routes_with_path_params() {
        let received = exchange(server_with_routes(local_config()), "GET /hello/ann HTTP/1.1\r\nConnection: close\r\n\r\n").await;

        assert!(received.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(received.contains("connection: close\r\n"));
        assert!(received.ends_with("\r\n\r\nhello ann"));
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let received = exchange(server_with_routes(local_config()), "GET /nowhere HTTP/1.1\r\nConnection: close\r\n\r\n").await;
        assert!(received.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[tokio::test]
    async fn failing_handler_is_internal_error() {
        let received = exchange(server_with_routes(local_config()), "GET /fail HTTP/1.0\r\n\r\n").await;
        assert!(received.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[tokio::test]
    async fn pipelined_requests_answer_in_order() {
        let raw = indoc! {r##"
        POST /echo HTTP/1.1
        Host: localhost
        Content-Length: 5

        firstGET /hello/bob HTTP/1.1
        Host: localhost

        POST /echo HTTP/1.1
        Host: localhost
        Transfer-Encoding: chunked
        Connection: close

        4
        last
        0

        "##}
        .replace('\n', "\r\n");

        let received = exchange(server_with_routes(local_config()), &raw).await;

        let first = received.find("first").unwrap();
        let second = received.find("hello bob").unwrap();
        let third = received.find("last").unwrap();
        assert!(first < second && second < third);
        assert_eq!(received.matches("HTTP/1.1 200 OK\r\n").count(), 3);
    }

    #[tokio::test]
    async fn malformed_request_is_bad_request() {
        let received = exchange(server_with_routes(local_config()), "GET /hello/ann HTTP/1.1\r\nBad Header\r\n\r\n").await;

        assert!(received.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(received.contains("connection: close\r\n"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut config = local_config();
        config.connection = ConnectionConfig { buffer: BufferConfig::new(1024, 4096).unwrap(), ..ConnectionConfig::default() };

        let received = exchange(server_with_routes(config), "POST /echo HTTP/1.1\r\nContent-Length: 100000\r\n\r\n").await;
        assert!(received.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    #[tokio::test]
    async fn worker_dispatcher_keeps_order() {
        let workers = NonZeroUsize::new(4).unwrap();
        let config = ServerConfig { dispatcher: DispatcherConfig::worker(workers, workers), ..local_config() };

        let raw = "GET /hello/a HTTP/1.1\r\n\r\nGET /hello/b HTTP/1.1\r\n\r\nGET /hello/c HTTP/1.1\r\nConnection: close\r\n\r\n";
        let received = exchange(server_with_routes(config), raw).await;

        let a = received.find("hello a").unwrap();
        let b = received.find("hello b").unwrap();
        let c = received.find("hello c").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn invalid_config() {
        let config = ServerConfig { max_connections: 0, ..local_config() };
        assert!(matches!(HttpServer::new(config), Err(ServerError::Config { .. })));
    }
}
