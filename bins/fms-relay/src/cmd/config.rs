use std::time::Duration;

use clap::Args;
use serde::Deserialize;

use fms_api::{ConfigError, RetryPolicy, load_optional};
use fms_bridge::kafka::{self, KafkaSettings};
use fms_bridge::mqtt::{self, MqttSettings};
use fms_bridge::RelaySettings;

use super::error::RelayError;

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub mqtt_broker: Option<String>,
    pub mqtt_port: Option<u16>,
    pub mqtt_topic: Option<String>,
    pub mqtt_keep_alive_secs: Option<u64>,
    pub kafka_broker: Option<String>,
    pub kafka_topic: Option<String>,
    pub poll_timeout_ms: Option<u64>,
    pub flush_timeout_ms: Option<u64>,
    pub channel_capacity: Option<usize>,
    pub retry_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub metadata_timeout_ms: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct RelayArgs {
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

    /// Kafka bootstrap servers
    #[arg(long, env = "KAFKA_BROKER")]
    pub kafka_broker: Option<String>,

    /// Kafka topic для пересылки
    #[arg(long, env = "KAFKA_TOPIC")]
    pub kafka_topic: Option<String>,

    /// Ожидание входящего MQTT сообщения за один опрос, мс
    #[arg(long)]
    pub poll_timeout_ms: Option<u64>,

    /// Окно flush после каждой отправки в Kafka, мс
    #[arg(long)]
    pub flush_timeout_ms: Option<u64>,

    /// Буфер входящих сообщений между MQTT receiver и циклом пересылки
    #[arg(long)]
    pub channel_capacity: Option<usize>,

    /// Пауза между попытками подключения, мс
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Лимит повторов подключения (без указания — бесконечно)
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Таймаут запроса metadata при подключении к Kafka, мс
    #[arg(long)]
    pub metadata_timeout_ms: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация после мержа: defaults < fms.toml < env/CLI
pub struct Effective {
    pub mqtt: MqttSettings,
    pub kafka: KafkaSettings,
    pub relay: RelaySettings,
    pub channel_capacity: usize,
    pub retry: RetryPolicy,
}

impl Effective {
    pub fn new(args: &RelayArgs) -> Result<Self, RelayError> {
        let cfg: Config = load_optional(&args.config)?;

        let keep_alive_secs = args
            .mqtt_keep_alive_secs
            .or(cfg.mqtt_keep_alive_secs)
            .unwrap_or(mqtt::DEFAULT_KEEP_ALIVE.as_secs());

        let channel_capacity = args
            .channel_capacity
            .or(cfg.channel_capacity)
            .unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        if channel_capacity == 0 {
            return Err(ConfigError::Invalid("channel_capacity must be > 0".into()).into());
        }

        let defaults = RelaySettings::default();
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
                client_id: mqtt::client_id("fms-relay"),
                keep_alive: Duration::from_secs(keep_alive_secs),
            },
            kafka: KafkaSettings {
                brokers: args
                    .kafka_broker
                    .clone()
                    .or(cfg.kafka_broker)
                    .unwrap_or_else(|| kafka::DEFAULT_BROKERS.into()),
                topic: args
                    .kafka_topic
                    .clone()
                    .or(cfg.kafka_topic)
                    .unwrap_or_else(|| kafka::DEFAULT_TOPIC.into()),
                metadata_timeout: args
                    .metadata_timeout_ms
                    .or(cfg.metadata_timeout_ms)
                    .map(Duration::from_millis)
                    .unwrap_or(kafka::DEFAULT_METADATA_TIMEOUT),
            },
            relay: RelaySettings {
                poll_timeout: args
                    .poll_timeout_ms
                    .or(cfg.poll_timeout_ms)
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.poll_timeout),
                flush_timeout: args
                    .flush_timeout_ms
                    .or(cfg.flush_timeout_ms)
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.flush_timeout),
            },
            channel_capacity,
            retry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: RelayArgs,
    }

    fn parse(argv: &[&str]) -> RelayArgs {
        let mut full = vec!["fms-relay"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).unwrap().args
    }

    #[test]
    fn defaults_match_fixed_values() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.toml");
        let args = parse(&[
            "--config",
            missing.to_str().unwrap(),
            "--kafka-broker",
            "redpanda:9092",
            "--kafka-topic",
            "fms-data-stream",
        ]);

        let eff = Effective::new(&args).unwrap();

        assert_eq!(eff.mqtt.port, 1883);
        assert_eq!(eff.mqtt.topic, "fms/data");
        assert_eq!(eff.kafka.brokers, "redpanda:9092");
        assert_eq!(eff.kafka.topic, "fms-data-stream");
        assert_eq!(eff.relay.poll_timeout, Duration::from_millis(10));
        assert_eq!(eff.relay.flush_timeout, Duration::from_millis(10));
        assert_eq!(eff.channel_capacity, 64);
        assert_eq!(eff.retry.max_retries, None);
    }

    #[test]
    fn config_file_values_are_used() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "mqtt_topic = \"fleet/+/data\"\nflush_timeout_ms = 25\nchannel_capacity = 8"
        )
        .unwrap();
        let args = parse(&["--config", file.path().to_str().unwrap(), "--channel-capacity", "16"]);

        let eff = Effective::new(&args).unwrap();

        assert_eq!(eff.mqtt.topic, "fleet/+/data");
        assert_eq!(eff.relay.flush_timeout, Duration::from_millis(25));
        assert_eq!(eff.channel_capacity, 16);
    }

    #[test]
    fn zero_keep_alive_disables_pings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mqtt_keep_alive_secs = 0").unwrap();
        let args = parse(&["--config", file.path().to_str().unwrap()]);

        let eff = Effective::new(&args).unwrap();

        assert_eq!(eff.mqtt.keep_alive, Duration::ZERO);
    }

    #[test]
    fn metadata_timeout_flag_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.toml");
        let args = parse(&["--config", missing.to_str().unwrap(), "--metadata-timeout-ms", "200"]);

        let eff = Effective::new(&args).unwrap();

        assert_eq!(eff.kafka.metadata_timeout, Duration::from_millis(200));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.toml");
        let args = parse(&["--config", missing.to_str().unwrap(), "--channel-capacity", "0"]);

        assert!(matches!(
            Effective::new(&args),
            Err(RelayError::Config(ConfigError::Invalid(_)))
        ));
    }
}
