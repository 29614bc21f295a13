// src/lib.rs — Library root for tradecoach

pub mod api;
pub mod cli;
pub mod coach;
pub mod directory;
pub mod engine;
pub mod infra;
pub mod stream;
