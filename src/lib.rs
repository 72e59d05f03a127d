pub mod app;
pub mod core;
pub mod domain;
pub mod fetcher;
pub mod pipeline;
pub mod producer;
pub mod validator;
