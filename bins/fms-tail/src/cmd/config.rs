use std::time::Duration;

use clap::Args;
use serde::Deserialize;

use fms_api::{RetryPolicy, load_optional};
use fms_bridge::kafka::{self, KafkaSettings};
use fms_bridge::tail::DEFAULT_TAIL_POLL_TIMEOUT;

use super::error::TailError;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub kafka_broker: Option<String>,
    pub kafka_topic: Option<String>,
    pub kafka_group: Option<String>,
    pub poll_timeout_ms: Option<u64>,
    pub retry_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub metadata_timeout_ms: Option<u64>,
}

#[derive(Args, Clone, Debug)]
pub struct TailArgs {
    /// Путь к TOML конфигу (отсутствие файла — не ошибка)
    #[arg(long, default_value = "fms.toml", env = "FMS_CONFIG")]
    pub config: String,

    /// Kafka bootstrap servers
    #[arg(long, env = "KAFKA_BROKER")]
    pub kafka_broker: Option<String>,

    #[arg(long, env = "KAFKA_TOPIC")]
    pub kafka_topic: Option<String>,

    /// Consumer group id
    #[arg(long, env = "KAFKA_GROUP")]
    pub kafka_group: Option<String>,

    /// Ожидание записи за один опрос, мс
    #[arg(long)]
    pub poll_timeout_ms: Option<u64>,

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

/// Итоговая конфигурация после мержа: defaults < fms.toml < env/CLI
pub struct Effective {
    pub kafka: KafkaSettings,
    pub group_id: String,
    pub poll_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Effective {
    pub fn new(args: &TailArgs) -> Result<Self, TailError> {
        let cfg: Config = load_optional(&args.config)?;

        let mut retry = RetryPolicy::default();
        if let Some(ms) = args.retry_delay_ms.or(cfg.retry_delay_ms) {
            retry.delay = Duration::from_millis(ms);
        }
        retry.max_retries = args.max_retries.or(cfg.max_retries);

        Ok(Self {
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
            group_id: args
                .kafka_group
                .clone()
                .or(cfg.kafka_group)
                .unwrap_or_else(|| kafka::DEFAULT_GROUP.into()),
            poll_timeout: args
                .poll_timeout_ms
                .or(cfg.poll_timeout_ms)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TAIL_POLL_TIMEOUT),
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
        args: TailArgs,
    }

    fn parse(argv: &[&str]) -> TailArgs {
        let mut full = vec!["fms-tail"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).unwrap().args
    }

    #[test]
    fn explicit_flags_win() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.toml");
        let args = parse(&[
            "--config",
            missing.to_str().unwrap(),
            "--kafka-broker",
            "localhost:19092",
            "--kafka-topic",
            "fms-data-stream",
            "--kafka-group",
            "fms-display-group",
        ]);

        let eff = Effective::new(&args).unwrap();

        assert_eq!(eff.kafka.brokers, "localhost:19092");
        assert_eq!(eff.kafka.topic, "fms-data-stream");
        assert_eq!(eff.group_id, "fms-display-group");
        assert_eq!(eff.poll_timeout, Duration::from_secs(1));
        assert_eq!(eff.retry, RetryPolicy::default());
        assert_eq!(eff.kafka.metadata_timeout, Duration::from_secs(1));
    }

    #[test]
    fn config_file_sets_timing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "poll_timeout_ms = 250\nretry_delay_ms = 10\nmax_retries = 0\nmetadata_timeout_ms = 50"
        )
        .unwrap();
        let args = parse(&["--config", file.path().to_str().unwrap()]);

        let eff = Effective::new(&args).unwrap();

        assert_eq!(eff.poll_timeout, Duration::from_millis(250));
        assert_eq!(eff.retry.delay, Duration::from_millis(10));
        assert_eq!(eff.retry.max_retries, Some(0));
        assert_eq!(eff.kafka.metadata_timeout, Duration::from_millis(50));
    }

    #[test]
    fn broken_config_file_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_timeout_ms = [").unwrap();
        let args = parse(&["--config", file.path().to_str().unwrap()]);

        assert!(matches!(Effective::new(&args), Err(TailError::Config(_))));
    }
}
