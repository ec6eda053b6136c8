pub mod config;
pub mod enums;
pub mod error;
pub mod confirmation_window;
pub mod db;
pub mod services;
pub mod api;
pub mod scheduler;

pub use config::Config;
pub use enums::{ ConfirmationStatus, Urgency };
pub use error::{ AppError, Result };
