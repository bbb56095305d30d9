//! Core library: category model, text extraction, classification, dispatch and the per-event
//! pipeline that ties them together.

pub mod category;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod extractor;
pub mod models;
pub mod pipeline;
pub mod settle;
