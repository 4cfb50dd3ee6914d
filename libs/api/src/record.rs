use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════
//  Telemetry record
// ═══════════════════════════════════════════════════════════════

pub const SPEED_MAX: f64 = 120.0;
pub const RPM_MIN: u32 = 700;
pub const RPM_MAX: u32 = 3500;
pub const FUEL_MAX: f64 = 100.0;

pub const DEFAULT_VEHICLE_ID: &str = "raspi-001";

/// Одна запись телеметрии автомобиля. Порядок полей = порядок на проводе.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub vehicle_id: String,
    /// Unix-время в секундах.
    pub timestamp: i64,
    /// км/ч, 0..=120, два знака после запятой.
    pub speed: f64,
    pub rpm: u32,
    /// Проценты, 0..=100, два знака после запятой.
    pub fuel_level: f64,
}

impl TelemetryRecord {
    /// Все числовые поля в допустимых диапазонах.
    pub fn in_range(&self) -> bool {
        (0.0..=SPEED_MAX).contains(&self.speed)
            && (RPM_MIN..=RPM_MAX).contains(&self.rpm)
            && (0.0..=FUEL_MAX).contains(&self.fuel_level)
    }
}

/// Округление до сотых.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ═══════════════════════════════════════════════════════════════
//  Generator
// ═══════════════════════════════════════════════════════════════

/// Генератор синтетической телеметрии с равномерным распределением
/// значений. Seed фиксирует последовательность (для тестов).
pub struct TelemetryGenerator {
    vehicle_id: String,
    rng: StdRng,
}

impl TelemetryGenerator {
    pub fn new(vehicle_id: impl Into<String>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            vehicle_id: vehicle_id.into(),
            rng,
        }
    }

    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    pub fn next_record(&mut self, timestamp: i64) -> TelemetryRecord {
        TelemetryRecord {
            vehicle_id: self.vehicle_id.clone(),
            timestamp,
            speed: round2(self.rng.random_range(0.0..=SPEED_MAX)),
            rpm: self.rng.random_range(RPM_MIN..=RPM_MAX),
            fuel_level: round2(self.rng.random_range(0.0..=FUEL_MAX)),
        }
    }
}
