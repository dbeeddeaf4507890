// Endpoints: single handlers and multi-verb resources

use crate::output::{OutputType, Reply};
use crate::params::{self, Args, ParamSource, ParamType, ParameterSpec};
use crate::{Error, Response};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Type-erased handler body.
pub type HandlerFn = dyn Fn(&Args) -> Result<Reply, Error> + Send + Sync;

/// A handler function together with its declared parameters and output type.
///
/// Parameters are declared once, when the handler is built, and bound on
/// every call:
///
/// ```rust,ignore
/// let get_todo = Handler::new("get_todo", |args| {
///     let id = args.int("id")?;
///     Ok(Reply::json(&todos.get(id)))
/// })
/// .param("id", ParamType::Int);
/// ```
#[derive(Clone)]
pub struct Handler {
    name: String,
    params: Vec<ParameterSpec>,
    output: OutputType,
    func: Arc<HandlerFn>,
}

impl Handler {
    /// Wrap `f`. The output type defaults to JSON.
    pub fn new<F, R>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Args) -> Result<R, Error> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            output: OutputType::default(),
            func: Arc::new(move |args: &Args| f(args).map(Into::into)),
        }
    }

    /// Declare a required parameter.
    pub fn param(self, name: impl Into<String>, ty: ParamType) -> Self {
        self.spec(ParameterSpec::new(name, ty))
    }

    /// Declare a parameter with a default.
    pub fn param_or(self, name: impl Into<String>, ty: ParamType, default: impl Into<Value>) -> Self {
        self.spec(ParameterSpec::new(name, ty).with_default(default))
    }

    pub fn spec(mut self, spec: ParameterSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn output(mut self, output: OutputType) -> Self {
        self.output = output;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    pub fn output_type(&self) -> &OutputType {
        &self.output
    }

    /// Bind parameters from `source`, invoke the handler once and format its
    /// reply.
    pub fn call(&self, source: &dyn ParamSource) -> Result<Response, Error> {
        let args = params::bind(&self.params, source)?;
        let reply = (self.func)(&args)?;
        self.output.format(reply)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("output", &self.output)
            .finish()
    }
}

/// An endpoint serving several HTTP verbs, one handler per verb.
#[derive(Debug, Clone)]
pub struct Resource {
    name: String,
    handlers: Vec<(String, Handler)>,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: Vec::new(),
        }
    }

    /// Serve `method` with `handler`, replacing an earlier handler for it.
    pub fn on(mut self, method: &str, handler: Handler) -> Self {
        let method = method.trim().to_ascii_uppercase();
        self.handlers.retain(|(existing, _)| *existing != method);
        self.handlers.push((method, handler));
        self
    }

    pub fn get(self, handler: Handler) -> Self {
        self.on("GET", handler)
    }

    pub fn post(self, handler: Handler) -> Self {
        self.on("POST", handler)
    }

    pub fn put(self, handler: Handler) -> Self {
        self.on("PUT", handler)
    }

    pub fn patch(self, handler: Handler) -> Self {
        self.on("PATCH", handler)
    }

    pub fn delete(self, handler: Handler) -> Self {
        self.on("DELETE", handler)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler_for(&self, method: &str) -> Option<&Handler> {
        self.handlers
            .iter()
            .find(|(verb, _)| verb.eq_ignore_ascii_case(method))
            .map(|(_, handler)| handler)
    }

    /// Verbs this resource implements, in registration order.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(verb, _)| verb.as_str())
    }

    /// Dispatch on the request verb. An unimplemented verb is
    /// [`Error::MethodNotAllowed`].
    pub fn dispatch(&self, method: &str, source: &dyn ParamSource) -> Result<Response, Error> {
        let handler = self.handler_for(method).ok_or_else(|| {
            Error::MethodNotAllowed(format!(
                "`{}` does not support {} method",
                self.name,
                method.to_ascii_uppercase()
            ))
        })?;
        handler.call(source)
    }
}

/// What a route points at.
#[derive(Debug, Clone)]
pub enum Endpoint {
    Function(Handler),
    Resource(Resource),
}

impl Endpoint {
    pub fn name(&self) -> &str {
        match self {
            Endpoint::Function(handler) => handler.name(),
            Endpoint::Resource(resource) => resource.name(),
        }
    }

    pub fn dispatch(&self, method: &str, source: &dyn ParamSource) -> Result<Response, Error> {
        match self {
            Endpoint::Function(handler) => handler.call(source),
            Endpoint::Resource(resource) => resource.dispatch(method, source),
        }
    }
}

impl From<Handler> for Endpoint {
    fn from(handler: Handler) -> Self {
        Endpoint::Function(handler)
    }
}

impl From<Resource> for Endpoint {
    fn from(resource: Resource) -> Self {
        Endpoint::Resource(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Source(HashMap<&'static str, Value>);

    impl ParamSource for Source {
        fn retrieve_param(&self, name: &str) -> Option<&Value> {
            self.0.get(name)
        }
    }

    fn echo_id() -> Handler {
        Handler::new("echo_id", |args| Ok(json!({"id": args.int("id")?})))
            .param("id", ParamType::Int)
    }

    #[test]
    fn test_call_binds_and_formats() {
        let source = Source(HashMap::from([("id", json!("12"))]));
        let response = echo_id().call(&source).unwrap();
        assert_eq!(response.status, 200);
        let body: Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body, json!({"id": 12}));
    }

    #[test]
    fn test_handler_invoked_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = Handler::new("count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .output(OutputType::Empty);

        handler.call(&Source(HashMap::new())).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_binding_failure_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = Handler::new("needs_id", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!(null))
        })
        .param("id", ParamType::Int);

        let err = handler.call(&Source(HashMap::new())).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resource_dispatch() {
        let resource = Resource::new("Todo")
            .get(echo_id())
            .delete(Handler::new("delete", |_| Ok(Reply::empty().with_status(204))).output(OutputType::Empty));

        let source = Source(HashMap::from([("id", json!(5))]));
        assert_eq!(resource.dispatch("get", &source).unwrap().status, 200);
        assert_eq!(resource.dispatch("DELETE", &source).unwrap().status, 204);
        assert_eq!(resource.methods().collect::<Vec<_>>(), vec!["GET", "DELETE"]);
    }

    #[test]
    fn test_resource_unsupported_verb() {
        let resource = Resource::new("Todo").get(echo_id());
        let err = resource
            .dispatch("PATCH", &Source(HashMap::new()))
            .unwrap_err();
        assert_eq!(err.status_code(), 405);
        assert!(err.to_string().contains("`Todo` does not support PATCH method"));
    }

    #[test]
    fn test_endpoint_name() {
        assert_eq!(Endpoint::from(echo_id()).name(), "echo_id");
        assert_eq!(Endpoint::from(Resource::new("Todos")).name(), "Todos");
    }
}
