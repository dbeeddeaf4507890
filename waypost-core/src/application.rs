// Application object and HTTP server

use crate::extensions::{Extension, ExtensionStorage, Extensions};
use crate::hooks::{Hook, HookEvent, HookRegistry};
use crate::routing::{Methods, RouteTable};
use crate::{
    Endpoint, Error, ErrorKind, ExecutionContext, Handler, HttpError, RawRequest, Resource,
    Response, Settings,
};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::body::{Body as _, Incoming as IncomingBody};
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::net::TcpListener;

/// User-registered error handler.
pub type ErrorHandlerFn = dyn Fn(&HttpError) -> Result<Response, Error> + Send + Sync;

/// Decides whether an error handler applies to an error.
#[derive(Clone)]
pub struct ErrorMatcher {
    label: String,
    predicate: Arc<dyn Fn(&HttpError) -> bool + Send + Sync>,
}

impl ErrorMatcher {
    /// Match with an arbitrary predicate.
    pub fn when<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&HttpError) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn any() -> Self {
        Self::when("any", |_| true)
    }

    pub fn status(status: u16) -> Self {
        Self::when(format!("status {}", status), move |error| error.status == status)
    }

    pub fn kind(kind: ErrorKind) -> Self {
        Self::when(format!("{:?}", kind), move |error| error.kind == kind)
    }

    /// Errors raised from a user error of type `E` (see [`Error::handler`]).
    pub fn of<E: StdError + 'static>() -> Self {
        Self::when(std::any::type_name::<E>(), |error| {
            error.downcast_ref::<E>().is_some()
        })
    }

    pub fn matches(&self, error: &HttpError) -> bool {
        (self.predicate)(error)
    }
}

impl fmt::Debug for ErrorMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorMatcher").field(&self.label).finish()
    }
}

/// The application: routes, hooks, error handlers, extension storage and
/// settings. Build it once at startup, then share it read-only between
/// requests.
///
/// ```rust,ignore
/// let mut app = App::new("todos");
/// app.route("/todos/<int:id>", ["GET"], get_todo)?
///     .resource("/lists/<int:id>", list_resource)?
///     .hook(HookEvent::RequestReceived, |ctx| Ok(()));
///
/// let response = app.handle(RawRequest::new("GET", "/todos/5"));
/// ```
pub struct App {
    settings: Settings,
    routes: RouteTable<Endpoint>,
    hooks: HookRegistry,
    error_handlers: Vec<(ErrorMatcher, Arc<ErrorHandlerFn>)>,
    extensions: Vec<(String, ExtensionStorage)>,
}

impl App {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(Settings::new(name))
    }

    pub fn with_settings(settings: Settings) -> Self {
        tracing::info!(app = %settings.name, debug = settings.debug, "App initialized");
        Self {
            settings,
            routes: RouteTable::new(),
            hooks: HookRegistry::new(),
            error_handlers: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn routes(&self) -> &RouteTable<Endpoint> {
        &self.routes
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Register a handler for `template` under `methods`.
    pub fn route(
        &mut self,
        template: &str,
        methods: impl Into<Methods>,
        handler: Handler,
    ) -> Result<&mut Self, Error> {
        self.routes
            .add(Endpoint::Function(handler), template, methods)?;
        Ok(self)
    }

    /// Register a resource for `template`. Every method reaches the
    /// resource, which answers 405 for verbs it does not implement.
    pub fn resource(&mut self, template: &str, resource: Resource) -> Result<&mut Self, Error> {
        self.routes
            .add(Endpoint::Resource(resource), template, Methods::Any)?;
        Ok(self)
    }

    pub fn hook<F>(&mut self, event: HookEvent, hook: F) -> &mut Self
    where
        F: Fn(&mut ExecutionContext<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.hooks.register(event, hook);
        self
    }

    /// Register a hook object.
    pub fn hook_with(&mut self, event: HookEvent, hook: impl Hook + 'static) -> &mut Self {
        self.hooks.register(event, hook);
        self
    }

    /// Register an error handler. Handlers are consulted in registration
    /// order and the first matching one wins.
    pub fn error_handler<F>(&mut self, matcher: ErrorMatcher, handler: F) -> &mut Self
    where
        F: Fn(&HttpError) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.error_handlers.push((matcher, Arc::new(handler)));
        self
    }

    /// Give `extension` fresh storage and let it install itself.
    pub fn extension<X: Extension>(&mut self, extension: X) -> Result<&mut Self, Error> {
        let name = extension.name();
        let storage: ExtensionStorage = Arc::new(RwLock::new(Extensions::new()));
        self.extensions.retain(|(existing, _)| *existing != name);
        self.extensions.push((name.clone(), storage.clone()));
        extension.install(self, storage)?;
        tracing::debug!(extension = %name, "Extension installed");
        Ok(self)
    }

    pub fn extension_storage(&self, name: &str) -> Option<ExtensionStorage> {
        self.extensions
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, storage)| storage.clone())
    }

    /// Build the combined route matcher ahead of the first request.
    pub fn prepare(&self) -> Result<(), Error> {
        self.routes.build().map(|_| ())
    }

    /// Serve one request. Always produces a response.
    pub fn handle(&self, raw: RawRequest) -> Response {
        let method = raw.method.to_ascii_uppercase();
        let path = raw.path.clone();

        let response = panic::catch_unwind(AssertUnwindSafe(|| self.respond(raw)))
            .unwrap_or_else(|payload| {
                let error = Error::from_panic(payload);
                tracing::error!(error = %error, "Caught error while serving request");
                fallback_response()
            });

        tracing::info!("{} {} :: {}", method, path, response.status_message());
        response
    }

    fn respond(&self, raw: RawRequest) -> Response {
        let execution = ExecutionContext::new(self, raw).execute();
        match (execution.response, execution.error) {
            (Some(response), _) => response,
            (None, Some(error)) => self.render_error(&error),
            (None, None) => fallback_response(),
        }
    }

    fn render_error(&self, error: &HttpError) -> Response {
        if let Some(response) = self.dispatch_to_handler(error) {
            return response;
        }
        error.as_response().unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to render error response");
            fallback_response()
        })
    }

    /// First registered handler whose matcher accepts `error`.
    ///
    /// A failing handler falls through to the default rendering.
    pub fn dispatch_to_handler(&self, error: &HttpError) -> Option<Response> {
        let (matcher, handler) = self
            .error_handlers
            .iter()
            .find(|(matcher, _)| matcher.matches(error))?;
        match handler(error) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::error!(matcher = ?matcher, error = %e, "Error handler failed");
                None
            }
        }
    }

    /// Serve HTTP/1.1 on the configured host and port.
    pub async fn run(self) -> Result<(), Error> {
        let addr = self.settings.bind_address();
        self.listen(&addr).await
    }

    /// Serve HTTP/1.1 on `addr` until the process ends.
    pub async fn listen(self, addr: &str) -> Result<(), Error> {
        self.prepare()?;
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, app = %self.settings.name, "Server listening");

        let app = Arc::new(self);

        loop {
            let (stream, peer) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let app = app.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: hyper::Request<IncomingBody>| {
                    let app = app.clone();
                    async move { serve(req, app).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::warn!(peer = %peer, error = %err, "Error serving connection");
                }
            });
        }
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("settings", &self.settings)
            .field("routes", &self.routes)
            .field("hooks", &self.hooks)
            .field("error_handlers", &self.error_handlers.len())
            .finish()
    }
}

fn fallback_response() -> Response {
    Response::text(500, "Internal Server Error")
}

/// Convert a hyper request, run it through the app on the blocking pool and
/// convert the response back.
///
/// Requests that cannot become a [`RawRequest`] (undecodable path, body over
/// the size limit, broken body stream) are answered here with the app's
/// error rendering and never reach a context.
async fn serve(
    req: hyper::Request<IncomingBody>,
    app: Arc<App>,
) -> Result<hyper::Response<Full<bytes::Bytes>>, Infallible> {
    let response = match read_request(req, app.settings().max_body_size).await {
        Ok(raw) => match tokio::task::spawn_blocking(move || app.handle(raw)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Request task failed");
                fallback_response()
            }
        },
        Err(error) => {
            tracing::debug!(error = %error, "Rejected request before dispatch");
            app.render_error(&HttpError::from(error))
        }
    };

    Ok(into_hyper(response))
}

async fn read_request(
    req: hyper::Request<IncomingBody>,
    limit: usize,
) -> Result<RawRequest, Error> {
    let target = req
        .uri()
        .path_and_query()
        .map_or("/", |pq| pq.as_str());
    let mut raw = RawRequest::from_target(req.method().as_str(), target)?;

    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            raw.headers.append(name.as_str(), value);
        }
    }

    let declared = req.body().size_hint().exact();
    let collected = Limited::new(req.into_body(), limit)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                Error::BodyTooLarge {
                    size: declared.map_or(limit + 1, |n| n as usize),
                    limit,
                }
            } else {
                Error::RequestParse(format!("Failed to read request body: {}", e))
            }
        })?;
    raw.body = collected.to_bytes().to_vec();
    Ok(raw)
}

fn into_hyper(response: Response) -> hyper::Response<Full<bytes::Bytes>> {
    let mut builder = hyper::Response::builder().status(response.status);
    for (name, value) in response.headers.to_wire() {
        builder = builder.header(name, value);
    }

    builder
        .body(Full::new(bytes::Bytes::from(response.body)))
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Invalid response, sending 500");
            let mut fallback = hyper::Response::new(Full::new(bytes::Bytes::from_static(
                b"Internal Server Error",
            )));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParamType;
    use serde_json::{Value, json};

    #[derive(Debug)]
    struct Teapot;

    impl fmt::Display for Teapot {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("short and stout")
        }
    }

    impl StdError for Teapot {}

    fn app() -> App {
        let mut app = App::new("app-tests");
        app.route(
            "/echo/<int:n>",
            ["GET"],
            Handler::new("echo", |args| Ok(json!({"n": args.int("n")?})))
                .param("n", ParamType::Int),
        )
        .unwrap()
        .route(
            "/teapot",
            ["GET"],
            Handler::new("teapot", |_| -> Result<Value, Error> {
                Err(Error::handler(Teapot))
            }),
        )
        .unwrap()
        .route(
            "/panic",
            ["GET"],
            Handler::new("panic", |_| -> Result<Value, Error> { panic!("handler blew up") }),
        )
        .unwrap();
        app
    }

    fn body(response: &Response) -> Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    #[test]
    fn test_handle_success() {
        let response = app().handle(RawRequest::new("GET", "/echo/4"));
        assert_eq!(response.status, 200);
        assert_eq!(body(&response), json!({"n": 4}));
    }

    #[test]
    fn test_default_error_rendering() {
        let response = app().handle(RawRequest::new("GET", "/unknown"));
        assert_eq!(response.status, 404);
        assert_eq!(body(&response)["name"], "Not Found");
        assert_eq!(body(&response)["code"], 404);
    }

    #[test]
    fn test_user_error_is_500_with_type_name() {
        let response = app().handle(RawRequest::new("GET", "/teapot"));
        assert_eq!(response.status, 500);
        assert_eq!(body(&response)["name"], "Teapot");
        assert_eq!(body(&response)["description"], "short and stout");
    }

    #[test]
    fn test_error_handler_by_type() {
        let mut app = app();
        app.error_handler(ErrorMatcher::of::<Teapot>(), |_| {
            Ok(Response::text(418, "I'm a teapot"))
        });
        let response = app.handle(RawRequest::new("GET", "/teapot"));
        assert_eq!(response.status, 418);
        assert_eq!(response.text_body(), "I'm a teapot");
    }

    #[test]
    fn test_error_handlers_first_registered_wins() {
        let mut app = app();
        app.error_handler(ErrorMatcher::any(), |_| Ok(Response::text(500, "any")))
            .error_handler(ErrorMatcher::status(404), |_| Ok(Response::text(404, "status")));
        let response = app.handle(RawRequest::new("GET", "/unknown"));
        assert_eq!(response.text_body(), "any");
    }

    #[test]
    fn test_failing_error_handler_falls_back_to_default() {
        let mut app = app();
        app.error_handler(ErrorMatcher::kind(ErrorKind::RouteNotFound), |_| {
            Err(Error::RequestParse("handler broke".into()))
        });
        let response = app.handle(RawRequest::new("GET", "/unknown"));
        assert_eq!(response.status, 404);
        assert_eq!(body(&response)["name"], "Not Found");
    }

    #[test]
    fn test_panic_becomes_500() {
        let response = app().handle(RawRequest::new("GET", "/panic"));
        assert_eq!(response.status, 500);
        assert_eq!(body(&response)["name"], "Internal Server Error");
    }

    #[test]
    fn test_into_hyper() {
        let response = Response::text(201, "ok").with_header("x-request-id", "7");
        let converted = into_hyper(response);
        assert_eq!(converted.status(), StatusCode::CREATED);
        assert_eq!(converted.headers()["content-type"], "text/plain");
        assert_eq!(converted.headers()["x-request-id"], "7");
    }
}
