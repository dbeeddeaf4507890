// Core library for the Waypost HTTP toolkit
// Typed URL templates, the combined route matcher, the request lifecycle,
// parameter binding and response formatting

pub mod application;
pub mod body;
pub mod config;
pub mod context;
pub mod error;
pub mod extensions;
pub mod handler;
pub mod hooks;
pub mod http;
pub mod logging;
pub mod output;
pub mod params;
pub mod pattern;
pub mod routing;
pub mod status;

// Re-export commonly used types
pub use application::{App, ErrorMatcher};
pub use body::{Body, FormData, MAX_REQUEST_BODY_SIZE};
pub use config::Settings;
pub use context::{ContextState, Execution, ExecutionContext};
pub use error::{Error, ErrorKind, HttpError};
pub use extensions::{Extension, ExtensionStorage, Extensions};
pub use handler::{Endpoint, Handler, Resource};
pub use hooks::{Hook, HookEvent, HookRegistry};
pub use http::{Headers, PathParams, RawRequest, Request, Response};
pub use output::{JsonOptions, JsonRender, OutputType, Payload, Reply};
pub use params::{Args, ParamSource, ParamType, ParameterSpec};
pub use pattern::{CompiledTemplate, PlaceholderType};
pub use routing::{Methods, Route, RouteMatch, RouteTable};
pub use status::{HttpStatus, status_line};
