pub mod db;
pub mod ssl_settings;
pub mod state;

pub use ssl_settings::SslSettings;
