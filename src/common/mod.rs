//! 共通の抽象化レイヤーとトレイト定義

pub mod context;
pub mod cookie;
pub mod http;
pub mod traits;
pub mod utils;

pub use context::RequestContext;
pub use cookie::{Cookie, SameSite};
pub use http::{Method, Request, Response, ResponseBuilder, StatusCode};
pub use traits::{Handler, Middleware};
pub use utils::{
    is_cookie_name_valid, is_cookie_value_valid, is_header_value_valid,
    parse_query_string, percent_decode, percent_encode, validate_cookie_name_value,
    validate_header_value,
};
