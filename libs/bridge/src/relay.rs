use std::io::Write;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fms_api::{CodecError, MessageSink, MessageSource, Polled, State, decode_json, encode_json};

use crate::BridgeError;

// ═══════════════════════════════════════════════════════════════
//  Relay loop — MQTT → JSON round trip → Kafka
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    /// Ожидание входящего сообщения за один опрос.
    pub poll_timeout: Duration,
    /// Короткий flush после каждой отправки.
    pub flush_timeout: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(10),
            flush_timeout: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub received: u64,
    pub forwarded: u64,
    pub decode_errors: u64,
    pub send_errors: u64,
}

enum Forward<E> {
    Sent,
    Decode(CodecError),
    Send(E),
}

/// Одно сообщение: decode → `Received:` в `out` → encode → send → короткий flush.
/// Flush, не уложившийся в окно, — норма: доставка продолжается в фоне.
fn forward<K, W>(
    sink: &K,
    out: &mut W,
    payload: &[u8],
    flush_timeout: Duration,
) -> std::io::Result<Forward<K::Error>>
where
    K: MessageSink,
    W: Write,
{
    let value = match decode_json(payload) {
        Ok(v) => v,
        Err(e) => return Ok(Forward::Decode(e)),
    };
    writeln!(out, "Received: {value}")?;
    out.flush()?;

    let bytes = match encode_json(&value) {
        Ok(b) => b,
        Err(e) => return Ok(Forward::Decode(e)),
    };
    if let Err(e) = sink.send(&bytes) {
        return Ok(Forward::Send(e));
    }
    if let Err(e) = sink.flush(flush_timeout) {
        tracing::trace!(error = %e, "flush window elapsed");
    }
    Ok(Forward::Sent)
}

/// Пересылать сообщения, пока не придёт сигнал остановки. Каждая
/// принятая запись печатается в `out`.
///
/// Порядок сохраняется: следующее сообщение берётся только после того,
/// как предыдущее передано приёмнику. Битые сообщения логируются и
/// отбрасываются. Закрытие источника — ошибка (переподключения нет).
pub async fn run_relay<S, K, W>(
    source: &mut S,
    sink: &K,
    out: &mut W,
    settings: &RelaySettings,
    token: &CancellationToken,
) -> Result<RelayStats, BridgeError>
where
    S: MessageSource,
    K: MessageSink,
    W: Write,
{
    let mut stats = RelayStats::default();
    tracing::info!(state = %State::Running, "relay running");

    loop {
        let polled = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            polled = source.poll(settings.poll_timeout) => polled,
        };

        match polled {
            Polled::Message(message) => {
                stats.received += 1;
                match forward(sink, out, &message.payload, settings.flush_timeout)? {
                    Forward::Sent => stats.forwarded += 1,
                    Forward::Decode(e) => {
                        stats.decode_errors += 1;
                        tracing::error!(topic = %message.topic, error = %e, "error decoding message, dropped");
                    }
                    Forward::Send(e) => {
                        stats.send_errors += 1;
                        tracing::error!(topic = %message.topic, error = %e, "error streaming message, dropped");
                    }
                }
            }
            Polled::Idle => {}
            Polled::Error(e) => tracing::error!(error = %e, "source error"),
            Polled::Closed => {
                tracing::error!(
                    received = stats.received,
                    forwarded = stats.forwarded,
                    "inbound source closed"
                );
                return Err(BridgeError::SourceClosed("mqtt subscription"));
            }
        }
    }

    tracing::info!(
        state = %State::Closing,
        received = stats.received,
        forwarded = stats.forwarded,
        decode_errors = stats.decode_errors,
        send_errors = stats.send_errors,
        "relay stopped"
    );
    Ok(stats)
}
