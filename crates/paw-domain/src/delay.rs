//! Retardos de steps ("3 days", "2 hours", "30 minutes", "1 week").
//!
//! El texto libre que escribe el operador se parsea una única vez al guardar
//! el step y se persiste en forma normalizada (`Delay::to_string`). El
//! despachador nunca vuelve a interpretar texto libre.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayUnit {
    Minute,
    Hour,
    Day,
    Week,
}

impl DelayUnit {
    fn minutes(self) -> i64 {
        match self {
            DelayUnit::Minute => 1,
            DelayUnit::Hour => 60,
            DelayUnit::Day => 60 * 24,
            DelayUnit::Week => 60 * 24 * 7,
        }
    }

    fn label(self, plural: bool) -> &'static str {
        match (self, plural) {
            (DelayUnit::Minute, false) => "minute",
            (DelayUnit::Minute, true) => "minutes",
            (DelayUnit::Hour, false) => "hour",
            (DelayUnit::Hour, true) => "hours",
            (DelayUnit::Day, false) => "day",
            (DelayUnit::Day, true) => "days",
            (DelayUnit::Week, false) => "week",
            (DelayUnit::Week, true) => "weeks",
        }
    }

    fn parse_token(token: &str) -> Option<Self> {
        match token {
            "m" | "min" | "mins" | "minute" | "minutes" => Some(DelayUnit::Minute),
            "h" | "hr" | "hrs" | "hour" | "hours" => Some(DelayUnit::Hour),
            "d" | "day" | "days" => Some(DelayUnit::Day),
            "w" | "wk" | "wks" | "week" | "weeks" => Some(DelayUnit::Week),
            _ => None,
        }
    }
}

/// Retardo máximo admitido: 520 semanas (diez años).
pub const MAX_DELAY_MINUTES: i64 = 520 * 7 * 24 * 60;

/// Duración etiquetada `{magnitude, unit}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Delay {
    pub magnitude: u32,
    pub unit: DelayUnit,
}

impl Delay {
    pub fn new(magnitude: u32, unit: DelayUnit) -> Self {
        Self { magnitude, unit }
    }

    pub fn total_minutes(&self) -> i64 {
        i64::from(self.magnitude) * self.unit.minutes()
    }

    /// Rechaza retardos por encima de `MAX_DELAY_MINUTES`.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.total_minutes() > MAX_DELAY_MINUTES {
            return Err(DomainError::ValidationError(format!("retardo demasiado largo: '{self}' (máximo 520 weeks)")));
        }
        Ok(())
    }

    /// Duración equivalente para sumar a un timestamp.
    pub fn as_duration(&self) -> Duration {
        Duration::minutes(self.total_minutes())
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit.label(self.magnitude != 1))
    }
}

impl FromStr for Delay {
    type Err = DomainError;

    /// Acepta `"<n> <unidad>"` con o sin espacio (`"3 days"`, `"3d"`,
    /// `" 2 Hours "`). La unidad es obligatoria.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let text = raw.trim().to_ascii_lowercase();
        let invalid = || DomainError::ValidationError(format!("retardo inválido: '{raw}' (ejemplos: '3 days', '2 hours', '30 minutes', '1 week')"));
        let digits_end = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
        if digits_end == 0 {
            return Err(invalid());
        }
        let magnitude: u32 = text[..digits_end].parse().map_err(|_| invalid())?;
        let unit = DelayUnit::parse_token(text[digits_end..].trim()).ok_or_else(invalid)?;
        let delay = Delay { magnitude, unit };
        delay.validate()?;
        Ok(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_operator_inputs() {
        assert_eq!("3 days".parse::<Delay>().unwrap(), Delay::new(3, DelayUnit::Day));
        assert_eq!("2 hours".parse::<Delay>().unwrap(), Delay::new(2, DelayUnit::Hour));
        assert_eq!("30 minutes".parse::<Delay>().unwrap(), Delay::new(30, DelayUnit::Minute));
        assert_eq!("1 week".parse::<Delay>().unwrap(), Delay::new(1, DelayUnit::Week));
        assert_eq!("  5 Days ".parse::<Delay>().unwrap(), Delay::new(5, DelayUnit::Day));
        assert_eq!("3d".parse::<Delay>().unwrap(), Delay::new(3, DelayUnit::Day));
        assert_eq!("0 minutes".parse::<Delay>().unwrap(), Delay::new(0, DelayUnit::Minute));
    }

    #[test]
    fn rejects_unparseable_values() {
        for bad in ["", "days", "3", "three days", "3 fortnights", "-1 day", "1.5 hours"] {
            assert!(bad.parse::<Delay>().is_err(), "debería rechazar '{bad}'");
        }
    }

    #[test]
    fn rejects_delays_beyond_ten_years() {
        assert!("520 weeks".parse::<Delay>().is_ok());
        assert!(matches!("521 weeks".parse::<Delay>(), Err(DomainError::ValidationError(_))));
        assert!("100000000 weeks".parse::<Delay>().is_err());
        assert!(Delay::new(u32::MAX, DelayUnit::Week).validate().is_err());
    }

    #[test]
    fn display_is_normalized_and_reparseable() {
        let d: Delay = "1 WEEKS".parse().unwrap();
        assert_eq!(d.to_string(), "1 week");
        assert_eq!(Delay::new(3, DelayUnit::Day).to_string(), "3 days");
        assert_eq!(d.to_string().parse::<Delay>().unwrap(), d);
    }

    #[test]
    fn converts_to_duration() {
        assert_eq!(Delay::new(3, DelayUnit::Day).as_duration(), Duration::days(3));
        assert_eq!(Delay::new(2, DelayUnit::Week).as_duration(), Duration::days(14));
        assert_eq!(Delay::new(90, DelayUnit::Minute).as_duration(), Duration::minutes(90));
    }
}
