//! Core types for the skiff application server.
//!
//! This crate provides the protocol-independent building blocks:
//! - [`Request`], [`RequestContext`] and [`Response`] types
//! - [`RoutePattern`] / [`RouteTable`] pattern routing with `:name` params
//! - [`MountTable`] static file mounts with a traversal guard
//! - [`logging`] for structured line logging
//!
//! The wire layer (HTTP parsing, response writing, WebSockets, the worker
//! pool and the [`App`](../skiff_http) facade) lives in `skiff-http`.

#![forbid(unsafe_code)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::single_match_else)]

pub mod logging;
mod request;
mod response;
pub mod routing;
pub mod static_files;

pub use request::{Headers, Method, Request, RequestContext};
pub use response::{mime_type_for_extension, ContentKind, Response, StatusCode};
pub use routing::{PatternError, Route, RoutePattern, RouteTable};
pub use static_files::{MountTable, StaticMount};

pub use logging::{LogConfig, LogLevel};
