//! Per-request execution context.
//!
//! An [`ExecutionContext`] carries one request from raw transport data to a
//! response, in strictly sequential stages:
//!
//! ```text
//! Created ──parse──▶ (request_received) ──route──▶ Routed (endpoint_determined)
//!         ──dispatch──▶ Dispatched (response_created) ──▶ Finished
//! ```
//!
//! `context_created` fires before parsing. Any stage may fail instead; the
//! failure is caught once, at the boundary of [`ExecutionContext::execute`],
//! normalized into an [`HttpError`], and the context ends in
//! [`ContextState::Error`] without running the remaining stages. Hooks that
//! already fired stay fired. Panics are caught the same way.
//!
//! `execute` consumes the context, so a context runs at most once.

use crate::extensions::Extensions;
use crate::hooks::HookEvent;
use crate::params::ParamSource;
use crate::{App, Endpoint, Error, HttpError, RawRequest, Request, Response};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};

/// Lifecycle state of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Created,
    Routed,
    Dispatched,
    Finished,
    Error,
}

impl ContextState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContextState::Finished | ContextState::Error)
    }
}

/// Outcome of [`ExecutionContext::execute`].
///
/// `response` is `Some` exactly when `state` is `Finished`; `error` is `Some`
/// exactly when `state` is `Error`.
#[derive(Debug)]
pub struct Execution {
    pub response: Option<Response>,
    pub state: ContextState,
    pub error: Option<HttpError>,
}

/// State for a single request. Never shared between requests.
pub struct ExecutionContext<'a> {
    app: &'a App,
    raw: Option<RawRequest>,
    pub request: Option<Request>,
    pub endpoint: Option<&'a Endpoint>,
    pub response: Option<Response>,
    pub error: Option<HttpError>,
    state: ContextState,
    /// Scratch storage for hooks, dropped with the context.
    pub data: Extensions,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(app: &'a App, raw: RawRequest) -> Self {
        Self {
            app,
            raw: Some(raw),
            request: None,
            endpoint: None,
            response: None,
            error: None,
            state: ContextState::Created,
            data: Extensions::new(),
        }
    }

    pub fn app(&self) -> &'a App {
        self.app
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Look a parameter up in path parameters, then query arguments, then
    /// the body of a `POST`, `PUT` or `PATCH` request.
    pub fn retrieve_param(&self, name: &str) -> Option<&Value> {
        self.request.as_ref()?.retrieve_param(name)
    }

    /// Run every stage and hand back the outcome. Never panics and never
    /// returns an error directly.
    pub fn execute(mut self) -> Execution {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run()))
            .unwrap_or_else(|payload| Err(Error::from_panic(payload)));

        match outcome {
            Ok(()) => self.state = ContextState::Finished,
            Err(error) => self.fail(error),
        }

        let finished = panic::catch_unwind(AssertUnwindSafe(|| self.fire(HookEvent::ContextFinished)))
            .unwrap_or_else(|payload| Err(Error::from_panic(payload)));
        if let Err(error) = finished {
            tracing::warn!(error = %error, "context_finished hook failed");
        }

        let response = match self.state {
            ContextState::Finished => self.response.take(),
            _ => None,
        };
        Execution {
            response,
            state: self.state,
            error: self.error.take(),
        }
    }

    fn run(&mut self) -> Result<(), Error> {
        self.fire(HookEvent::ContextCreated)?;

        self.parse_request()?;
        self.fire(HookEvent::RequestReceived)?;

        self.determine_endpoint()?;
        self.state = ContextState::Routed;
        self.fire(HookEvent::EndpointDetermined)?;

        self.dispatch_request()?;
        self.state = ContextState::Dispatched;
        self.fire(HookEvent::ResponseCreated)?;

        Ok(())
    }

    fn fire(&mut self, event: HookEvent) -> Result<(), Error> {
        let app = self.app;
        app.hooks().fire(event, self)
    }

    fn parse_request(&mut self) -> Result<(), Error> {
        let raw = self
            .raw
            .take()
            .ok_or_else(|| Error::RequestParse("Request was already consumed".to_string()))?;
        self.request = Some(Request::parse(raw, self.app.settings().max_body_size)?);
        Ok(())
    }

    fn determine_endpoint(&mut self) -> Result<(), Error> {
        let app = self.app;
        let request = self.request.as_mut().ok_or_else(missing_request)?;
        let found = app.routes().match_route(&request.path, &request.method)?;
        let endpoint = found.endpoint();
        request.path_params = Some(found.params);
        self.endpoint = Some(endpoint);
        Ok(())
    }

    fn dispatch_request(&mut self) -> Result<(), Error> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| Error::RouteNotFound("No endpoint determined".to_string()))?;
        let request = self.request.as_ref().ok_or_else(missing_request)?;
        let response = endpoint.dispatch(&request.method, request)?;
        self.response = Some(response);
        Ok(())
    }

    fn fail(&mut self, error: Error) {
        if self.app.settings().debug {
            tracing::error!(error = %error, kind = ?error.kind(), "Request processing ended with an error");
        } else {
            tracing::debug!(error = %error, kind = ?error.kind(), "Request processing ended with an error");
        }
        self.state = ContextState::Error;
        self.response = None;
        self.error = Some(HttpError::from(error));
    }
}

impl ParamSource for ExecutionContext<'_> {
    fn retrieve_param(&self, name: &str) -> Option<&Value> {
        ExecutionContext::retrieve_param(self, name)
    }
}

fn missing_request() -> Error {
    Error::RequestParse("Request has not been parsed".to_string())
}
