use std::time::Duration;

use clap::Args;
use serde::Deserialize;

use fms_api::record::DEFAULT_VEHICLE_ID;
use fms_api::{RetryPolicy, load_optional};
use fms_bridge::mqtt::{self, MqttSettings};
use fms_bridge::ProducerSettings;

use super::error::PublisherError;

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub mqtt_broker: Option<String>,
    pub mqtt_port: Option<u16>,
    pub mqtt_topic: Option<String>,
    pub mqtt_keep_alive_secs: Option<u64>,
    pub vehicle_id: Option<String>,
    pub iterations: Option<u32>,
    pub interval_ms: Option<u64>,
    pub seed: Option<u64>,
    pub retry_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct PublishArgs {
    /// Путь к TOML конфигу (отсутствие файла — не ошибка)
    #[arg(long, default_value = "fms.toml", env = "FMS_CONFIG")]
    pub config: String,

    /// Хост MQTT брокера
    #[arg(long, env = "MQTT_BROKER")]
    pub mqtt_broker: Option<String>,

    #[arg(long)]
    pub mqtt_port: Option<u16>,

    #[arg(long)]
    pub mqtt_topic: Option<String>,

    /// Keep-alive MQTT сессии, секунды (0 — без ping)
    #[arg(long)]
    pub mqtt_keep_alive_secs: Option<u64>,

    #[arg(long)]
    pub vehicle_id: Option<String>,

    /// Сколько записей опубликовать
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Пауза между публикациями, мс
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Seed для PRNG (без указания — энтропия ОС)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Пауза между попытками подключения, мс
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Лимит повторов подключения (без указания — бесконечно)
    #[arg(long)]
    pub max_retries: Option<u32>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация после мержа: defaults < fms.toml < env/CLI
pub struct Effective {
    pub mqtt: MqttSettings,
    pub producer: ProducerSettings,
    pub retry: RetryPolicy,
    pub vehicle_id: String,
    pub seed: Option<u64>,
}

impl Effective {
    pub fn new(args: &PublishArgs) -> Result<Self, PublisherError> {
        let cfg: Config = load_optional(&args.config)?;

        let keep_alive_secs = args
            .mqtt_keep_alive_secs
            .or(cfg.mqtt_keep_alive_secs)
            .unwrap_or(mqtt::DEFAULT_KEEP_ALIVE.as_secs());

        let defaults = ProducerSettings::default();
        let mut retry = RetryPolicy::default();
        if let Some(ms) = args.retry_delay_ms.or(cfg.retry_delay_ms) {
            retry.delay = Duration::from_millis(ms);
        }
        retry.max_retries = args.max_retries.or(cfg.max_retries);

        Ok(Self {
            mqtt: MqttSettings {
                host: args
                    .mqtt_broker
                    .clone()
                    .or(cfg.mqtt_broker)
                    .unwrap_or_else(|| mqtt::DEFAULT_HOST.into()),
                port: args.mqtt_port.or(cfg.mqtt_port).unwrap_or(mqtt::DEFAULT_PORT),
                topic: args
                    .mqtt_topic
                    .clone()
                    .or(cfg.mqtt_topic)
                    .unwrap_or_else(|| mqtt::DEFAULT_TOPIC.into()),
                client_id: mqtt::client_id("fms-publisher"),
                keep_alive: Duration::from_secs(keep_alive_secs),
            },
            producer: ProducerSettings {
                iterations: args.iterations.or(cfg.iterations).unwrap_or(defaults.iterations),
                interval: args
                    .interval_ms
                    .or(cfg.interval_ms)
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.interval),
            },
            retry,
            vehicle_id: args
                .vehicle_id
                .clone()
                .or(cfg.vehicle_id)
                .unwrap_or_else(|| DEFAULT_VEHICLE_ID.into()),
            seed: args.seed.or(cfg.seed),
        })
    }
}
