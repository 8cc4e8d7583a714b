pub mod schema;

pub use schema::{
    default_config_path, CheckConfig, Config, GithubConfig, NotifyConfig, SourceConfig,
    StatusConfig, TelegramConfig, WhatsAppConfig,
};
