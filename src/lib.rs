//! Terminal viewer for the Dentmakers Index, a ranking of technology
//! companies by valuation.
//!
//! The table engine in [`engine`] is independent of the terminal front-end:
//! a [`record::Dataset`] under a [`column::Schema`] is filtered, sorted and
//! paged into a [`engine::RenderedTable`], which [`ui`] draws with ratatui
//! and [`plain`] prints as text.

pub mod column;
pub mod controller;
pub mod domain;
pub mod engine;
pub mod inputter;
pub mod logging;
pub mod model;
pub mod plain;
pub mod record;
pub mod stats;
pub mod ui;
