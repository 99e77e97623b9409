use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Process-wide filtering bypass. Leaves rewrites and per-client internet
/// pause intact; everything else passes through while active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtectionPause {
    #[default]
    Off,
    Forever,
    Until {
        until: DateTime<Utc>,
    },
}

impl ProtectionPause {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self {
            ProtectionPause::Off => false,
            ProtectionPause::Forever => true,
            ProtectionPause::Until { until } => *until > now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_off_is_inactive() {
        assert!(!ProtectionPause::Off.is_active(Utc::now()));
    }

    #[test]
    fn test_forever_is_active() {
        assert!(ProtectionPause::Forever.is_active(Utc::now()));
    }

    #[test]
    fn test_until_expires() {
        let now = Utc::now();
        let pause = ProtectionPause::Until { until: now + Duration::minutes(5) };
        assert!(pause.is_active(now));
        assert!(!pause.is_active(now + Duration::minutes(6)));
    }

    #[test]
    fn test_json_roundtrip() {
        let pause = ProtectionPause::Forever;
        let json = serde_json::to_string(&pause).unwrap();
        let back: ProtectionPause = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pause);

        let off: ProtectionPause = serde_json::from_str(r#"{"mode":"OFF"}"#).unwrap();
        assert_eq!(off, ProtectionPause::Off);
    }
}
