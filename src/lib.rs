#![forbid(unsafe_code)]

pub mod books_api;
pub mod cli;
pub mod convert;
pub mod formats;
pub mod isbn;
pub mod logging;
pub mod store;
pub mod thumbnails;
