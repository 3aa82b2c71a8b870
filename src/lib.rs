//! Incremental pagination for infinite-scroll list surfaces.
//!
//! [`engine::Engine`] decides when to fetch the next page, checks that each
//! response still belongs to the current [`session::Session`], merges accepted
//! pages and reports [`delta::IndexDelta`]s to a [`surface::ListSurface`].
//! Pages come from a [`source::DataSource`] running on a worker thread.

pub mod config;
pub mod delta;
pub mod dump;
pub mod engine;
pub mod session;
pub mod source;
pub mod surface;
pub mod viewer;
pub mod watch;
