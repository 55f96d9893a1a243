//! Logging initialization

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

use super::test_capture::init_test_capture;

/// Logging profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// Human-readable output, `docrel=debug` unless `RUST_LOG` says otherwise
    #[default]
    Development,
    /// JSON output, `docrel=info` unless `RUST_LOG` says otherwise
    Production,
    /// In-memory capture of every event, see `init_test_capture()`
    Test,
}

impl Profile {
    /// Filter used when `RUST_LOG` is unset; the test profile is unfiltered
    pub fn default_directive(&self) -> Option<&'static str> {
        match self {
            Profile::Development => Some("docrel=debug,docrel_core=debug"),
            Profile::Production => Some("docrel=info,docrel_core=info"),
            Profile::Test => None,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_directive().unwrap_or("trace")))
    }
}

static INIT_ONCE: Once = Once::new();

/// Initialize the logging facility
///
/// Only the first call has an effect. A global subscriber installed
/// elsewhere beforehand is left in place.
///
/// # Example
///
/// ```
/// use docrel_core::logging_facility::{init, Profile};
///
/// init(Profile::Production);
/// ```
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        match profile {
            Profile::Development => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(profile.filter())
                    .finish()
                    .try_init();
            }
            Profile::Production => {
                let _ = tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(profile.filter())
                    .finish()
                    .try_init();
            }
            Profile::Test => {
                init_test_capture();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_idempotent() {
        init(Profile::Test);
        init(Profile::Test);
        init(Profile::Development);
    }

    #[test]
    fn test_default_directives() {
        assert_eq!(
            Profile::Development.default_directive(),
            Some("docrel=debug,docrel_core=debug")
        );
        assert_eq!(
            Profile::Production.default_directive(),
            Some("docrel=info,docrel_core=info")
        );
        assert_eq!(Profile::Test.default_directive(), None);
        assert_eq!(Profile::default(), Profile::Development);
    }
}
