use serde::Serialize;

use crate::record::TelemetryRecord;

/// Ошибка разбора/сборки payload. Всегда относится к одному сообщению:
/// сообщение отбрасывается, цикл продолжается.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("empty payload")]
    Empty,

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// UTF-8 → JSON. Порядок ключей объекта сохраняется.
pub fn decode_json(payload: &[u8]) -> Result<serde_json::Value, CodecError> {
    if payload.is_empty() {
        return Err(CodecError::Empty);
    }
    let text = std::str::from_utf8(payload)?;
    Ok(serde_json::from_str(text)?)
}

/// Типизированный разбор записи телеметрии.
pub fn decode_record(payload: &[u8]) -> Result<TelemetryRecord, CodecError> {
    if payload.is_empty() {
        return Err(CodecError::Empty);
    }
    let text = std::str::from_utf8(payload)?;
    Ok(serde_json::from_str(text)?)
}

/// Компактный JSON без пробелов.
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(value)?)
}
