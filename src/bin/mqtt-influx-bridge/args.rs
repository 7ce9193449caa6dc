use std::time::Duration;

use clap::Parser;
use mqtt_influx_bridge::{influx::InfluxConfig, mqtt::MqttConfig};
use tracing::Level;

#[derive(Debug, Parser)]
pub struct Args {
    #[arg(long, env = "MQTT_BROKER_IP")]
    pub mqtt_host: String,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    pub mqtt_port: u16,

    #[arg(long, env = "MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub mqtt_password: Option<String>,

    #[arg(long, env = "MQTT_CLIENT_ID", default_value = "mqtt-influx-bridge")]
    pub mqtt_client_id: String,

    #[arg(long, env = "MQTT_KEEP_ALIVE_SECS", default_value_t = 60)]
    pub mqtt_keep_alive_secs: u64,

    #[arg(long, env = "MQTT_CONNECT_ATTEMPTS", default_value_t = 5)]
    pub mqtt_connect_attempts: u32,

    #[arg(long, env = "INFLUX_URL")]
    pub influx_url: String,

    #[arg(long, env = "INFLUX_TOKEN", hide_env_values = true)]
    pub influx_token: String,

    #[arg(long, env = "INFLUX_ORG")]
    pub influx_org: String,

    #[arg(long, env = "INFLUX_BUCKET")]
    pub influx_bucket: String,

    #[arg(long, env = "INFLUX_TIMEOUT_SECS", default_value_t = 10)]
    pub influx_timeout_secs: u64,

    #[arg(long, env = "INFLUX_READY_ATTEMPTS", default_value_t = 10)]
    pub influx_ready_attempts: u32,

    #[arg(long, env = "INFLUX_READY_INTERVAL_SECS", default_value_t = 1)]
    pub influx_ready_interval_secs: u64,

    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: Level,
}

impl Args {
    pub fn mqtt_config(&self) -> MqttConfig {
        MqttConfig {
            host: self.mqtt_host.clone(),
            port: self.mqtt_port,
            client_id: self.mqtt_client_id.clone(),
            username: self.mqtt_username.clone(),
            password: self.mqtt_password.clone(),
            keep_alive: Duration::from_secs(self.mqtt_keep_alive_secs.max(1)),
            connect_attempts: self.mqtt_connect_attempts,
        }
    }

    pub fn influx_config(&self) -> InfluxConfig {
        InfluxConfig {
            url: self.influx_url.clone(),
            token: self.influx_token.clone(),
            org: self.influx_org.clone(),
            bucket: self.influx_bucket.clone(),
            timeout: Duration::from_secs(self.influx_timeout_secs),
            ready_attempts: self.influx_ready_attempts,
            ready_interval: Duration::from_secs(self.influx_ready_interval_secs),
        }
    }
}
