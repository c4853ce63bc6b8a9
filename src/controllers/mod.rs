//! Controllers module
//!
//! Business-logic handlers reachable only through the dispatcher's
//! handler contract: consume a [`crate::context::RequestContext`],
//! produce a response payload or a [`crate::error::RequestError`].

mod web;

pub use web::WebController;
