// HTTP status codes and the reason-phrase table used for status lines

/// Status codes the toolkit knows a reason phrase for.
///
/// Anything outside this table can still be sent (responses carry a plain
/// `u16`), it just renders as `"<code> Unknown"` in the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpStatus {
    Continue = 100,
    SwitchingProtocols = 101,

    Ok = 200,
    Created = 201,
    Accepted = 202,
    NonAuthoritativeInformation = 203,
    NoContent = 204,
    ResetContent = 205,
    PartialContent = 206,

    MultipleChoices = 300,
    MovedPermanently = 301,
    Found = 302,
    SeeOther = 303,
    NotModified = 304,
    UseProxy = 305,
    TemporaryRedirect = 307,
    PermanentRedirect = 308,

    BadRequest = 400,
    Unauthorized = 401,
    PaymentRequired = 402,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    NotAcceptable = 406,
    ProxyAuthenticationRequired = 407,
    RequestTimeout = 408,
    Conflict = 409,
    Gone = 410,
    LengthRequired = 411,
    PreconditionFailed = 412,
    PayloadTooLarge = 413,
    UriTooLong = 414,
    UnsupportedMediaType = 415,
    RangeNotSatisfiable = 416,
    ExpectationFailed = 417,
    ImATeapot = 418,
    MisdirectedRequest = 421,
    UpgradeRequired = 426,
    PreconditionRequired = 428,
    TooManyRequests = 429,
    RequestHeaderFieldsTooLarge = 431,

    InternalServerError = 500,
    NotImplemented = 501,
    BadGateway = 502,
    ServiceUnavailable = 503,
    GatewayTimeout = 504,
    HttpVersionNotSupported = 505,
    VariantAlsoNegotiates = 506,
}

const TABLE: &[(HttpStatus, &str)] = &[
    (HttpStatus::Continue, "Continue"),
    (HttpStatus::SwitchingProtocols, "Switching Protocols"),
    (HttpStatus::Ok, "OK"),
    (HttpStatus::Created, "Created"),
    (HttpStatus::Accepted, "Accepted"),
    (
        HttpStatus::NonAuthoritativeInformation,
        "Non-Authoritative Information",
    ),
    (HttpStatus::NoContent, "No Content"),
    (HttpStatus::ResetContent, "Reset Content"),
    (HttpStatus::PartialContent, "Partial Content"),
    (HttpStatus::MultipleChoices, "Multiple Choices"),
    (HttpStatus::MovedPermanently, "Moved Permanently"),
    (HttpStatus::Found, "Found"),
    (HttpStatus::SeeOther, "See Other"),
    (HttpStatus::NotModified, "Not Modified"),
    (HttpStatus::UseProxy, "Use Proxy"),
    (HttpStatus::TemporaryRedirect, "Temporary Redirect"),
    (HttpStatus::PermanentRedirect, "Permanent Redirect"),
    (HttpStatus::BadRequest, "Bad Request"),
    (HttpStatus::Unauthorized, "Unauthorized"),
    (HttpStatus::PaymentRequired, "Payment Required"),
    (HttpStatus::Forbidden, "Forbidden"),
    (HttpStatus::NotFound, "Not Found"),
    (HttpStatus::MethodNotAllowed, "Method Not Allowed"),
    (HttpStatus::NotAcceptable, "Not Acceptable"),
    (
        HttpStatus::ProxyAuthenticationRequired,
        "Proxy Authentication Required",
    ),
    (HttpStatus::RequestTimeout, "Request Timeout"),
    (HttpStatus::Conflict, "Conflict"),
    (HttpStatus::Gone, "Gone"),
    (HttpStatus::LengthRequired, "Length Required"),
    (HttpStatus::PreconditionFailed, "Precondition Failed"),
    (HttpStatus::PayloadTooLarge, "Payload Too Large"),
    (HttpStatus::UriTooLong, "URI Too Long"),
    (HttpStatus::UnsupportedMediaType, "Unsupported Media Type"),
    (HttpStatus::RangeNotSatisfiable, "Range Not Satisfiable"),
    (HttpStatus::ExpectationFailed, "Expectation Failed"),
    (HttpStatus::ImATeapot, "I'm a teapot"),
    (HttpStatus::MisdirectedRequest, "Misdirected Request"),
    (HttpStatus::UpgradeRequired, "Upgrade Required"),
    (HttpStatus::PreconditionRequired, "Precondition Required"),
    (HttpStatus::TooManyRequests, "Too Many Requests"),
    (
        HttpStatus::RequestHeaderFieldsTooLarge,
        "Request Header Fields Too Large",
    ),
    (HttpStatus::InternalServerError, "Internal Server Error"),
    (HttpStatus::NotImplemented, "Not Implemented"),
    (HttpStatus::BadGateway, "Bad Gateway"),
    (HttpStatus::ServiceUnavailable, "Service Unavailable"),
    (HttpStatus::GatewayTimeout, "Gateway Timeout"),
    (HttpStatus::HttpVersionNotSupported, "HTTP Version Not Supported"),
    (HttpStatus::VariantAlsoNegotiates, "Variant Also Negotiates"),
];

impl HttpStatus {
    /// Get the numeric status code
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the reason phrase for the status code
    pub fn reason(&self) -> &'static str {
        TABLE
            .iter()
            .find(|(status, _)| status == self)
            .map(|(_, reason)| *reason)
            .unwrap_or("Unknown")
    }

    /// Look a status up by its numeric code
    pub fn from_code(code: u16) -> Option<Self> {
        TABLE
            .iter()
            .find(|(status, _)| status.code() == code)
            .map(|(status, _)| *status)
    }

    /// Check if status is client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code())
    }

    /// Check if status is server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.code())
    }
}

impl std::fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

impl From<HttpStatus> for u16 {
    fn from(status: HttpStatus) -> Self {
        status.code()
    }
}

/// Reason phrase for an arbitrary numeric code.
pub fn reason_phrase(code: u16) -> &'static str {
    HttpStatus::from_code(code)
        .map(|status| status.reason())
        .unwrap_or("Unknown")
}

/// Full status line text, e.g. `"404 Not Found"`.
pub fn status_line(code: u16) -> String {
    format!("{} {}", code, reason_phrase(code))
}
