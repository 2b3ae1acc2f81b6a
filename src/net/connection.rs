//! Connection-quality signal and the bandwidth gate built on it.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

/// Effective connection type, slowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EffectiveConnectionType {
    Slow2g,
    TwoG,
    ThreeG,
    FourG,
}

impl EffectiveConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slow2g => "slow-2g",
            Self::TwoG => "2g",
            Self::ThreeG => "3g",
            Self::FourG => "4g",
        }
    }

    /// The two slowest tiers.
    pub fn is_constrained(&self) -> bool {
        matches!(self, Self::Slow2g | Self::TwoG)
    }
}

impl fmt::Display for EffectiveConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownConnectionType(pub String);

impl fmt::Display for UnknownConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown connection type '{}' (expected slow-2g, 2g, 3g or 4g)",
            self.0
        )
    }
}

impl std::error::Error for UnknownConnectionType {}

impl FromStr for EffectiveConnectionType {
    type Err = UnknownConnectionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Ok(Self::Slow2g),
            "2g" => Ok(Self::TwoG),
            "3g" => Ok(Self::ThreeG),
            "4g" => Ok(Self::FourG),
            other => Err(UnknownConnectionType(other.to_string())),
        }
    }
}

/// Live connection-quality signal, shared between the host and the
/// prefetch strategies. `None` means the host exposes no signal.
///
/// Clones observe the same value, so the host can update it while
/// strategies are mounted.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSignal {
    current: Arc<RwLock<Option<EffectiveConnectionType>>>,
}

impl ConnectionSignal {
    /// A host without any connection information.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn reporting(kind: EffectiveConnectionType) -> Self {
        Self {
            current: Arc::new(RwLock::new(Some(kind))),
        }
    }

    pub fn set(&self, kind: Option<EffectiveConnectionType>) {
        match self.current.write() {
            Ok(mut guard) => *guard = kind,
            Err(poisoned) => *poisoned.into_inner() = kind,
        }
    }

    pub fn effective_type(&self) -> Option<EffectiveConnectionType> {
        match self.current.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// True on a very slow link. Fails open: no signal means unconstrained.
    pub fn is_constrained(&self) -> bool {
        self.effective_type()
            .map(|kind| kind.is_constrained())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slowest_two_tiers_are_constrained() {
        assert!(ConnectionSignal::reporting(EffectiveConnectionType::Slow2g).is_constrained());
        assert!(ConnectionSignal::reporting(EffectiveConnectionType::TwoG).is_constrained());
        assert!(!ConnectionSignal::reporting(EffectiveConnectionType::ThreeG).is_constrained());
        assert!(!ConnectionSignal::reporting(EffectiveConnectionType::FourG).is_constrained());
    }

    #[test]
    fn missing_signal_fails_open() {
        assert!(!ConnectionSignal::unavailable().is_constrained());
    }

    #[test]
    fn updates_are_visible_to_clones() {
        let signal = ConnectionSignal::unavailable();
        let seen_by_strategy = signal.clone();
        signal.set(Some(EffectiveConnectionType::TwoG));
        assert!(seen_by_strategy.is_constrained());
        signal.set(None);
        assert!(!seen_by_strategy.is_constrained());
    }

    #[test]
    fn parse_connection_types() {
        assert_eq!("slow-2g".parse(), Ok(EffectiveConnectionType::Slow2g));
        assert_eq!("2G".parse(), Ok(EffectiveConnectionType::TwoG));
        assert_eq!(" 4g ".parse(), Ok(EffectiveConnectionType::FourG));
        assert!("5g".parse::<EffectiveConnectionType>().is_err());
        assert_eq!(EffectiveConnectionType::ThreeG.to_string(), "3g");
    }
}
