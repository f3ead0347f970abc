mod settings;

pub use settings::{
    ApiConfig, GoogleConfig, OtelConfig, PushConfig, RedisConfig, ReminderConfig, ServerConfig,
    Settings, StoreConfig,
};
