#![allow(async_fn_in_trait)]
pub mod batch;
pub mod cli;
pub mod coords;
pub mod error;
pub mod geometry;
pub mod osm;
pub mod provider;
pub mod request_template;
pub mod sentinelhub;
