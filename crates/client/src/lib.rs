//! Network side of the dispatch lifecycle: the backend API client, the
//! contact catalog, uploads, submission, and queue tracking, tied together
//! by a per-session [`controller::DispatchController`].

pub mod api;
pub mod catalog;
pub mod controller;
pub mod submitter;
pub mod tracker;
pub mod uploader;
