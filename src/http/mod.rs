//! HTTP protocol layer module
//!
//! Response builders and MIME detection, decoupled from business logic.

pub mod mime;
pub mod response;

pub use response::{
    build_404_response, build_500_response, build_file_response, build_html_response,
    build_redirect_response, clear_cookie, with_cookie,
};
