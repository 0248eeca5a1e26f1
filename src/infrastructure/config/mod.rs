mod settings;

pub use settings::{
    BroadcastConfig, ChannelConfig, ChannelConfigSource, ChannelsConfig, DatabaseConfig,
    OtelConfig, RedisConfig, Settings, DEFAULT_BROADCAST_BATCH_SIZE, DEFAULT_CHANNEL_TIMEOUT_MS,
};
