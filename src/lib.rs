pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod scheduler;

pub use app::App;
pub use config::Config;
pub use error::{AppError, Result};
pub use pipeline::{DeliveryOutcome, FeedOutcome, Pipeline, TickReport};
pub use scheduler::Scheduler;
