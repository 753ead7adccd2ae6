use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Requested access for an open call, as handed to us by the storage
    /// layer. Multiple bits may be set (e.g. `WRITE | CREATE`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct OpenMode: u32 {
        const READ = 0x0001;
        const WRITE = 0x0002;
        const READ_WRITE = 0x0004;
        const CREATE = 0x0008;
        /// Create at the redirect target ("new file" semantics).
        const NEW = 0x0010;
        const TRUNCATE = 0x0020;
    }
}

impl OpenMode {
    /// Bypass policy: whether this open skips redirect-target verification
    /// entirely.
    ///
    /// Verification exists to catch redirects that point a *reader* at a
    /// server which cannot actually serve the bytes. Writes, creates, and
    /// truncates address a target that may legitimately not hold the data
    /// yet, so they pass straight through.
    pub fn bypasses_verification(self) -> bool {
        self.intersects(
            Self::WRITE | Self::READ_WRITE | Self::CREATE | Self::NEW | Self::TRUNCATE,
        )
    }
}

/// A (host, port) pair a storage server points a client at instead of
/// serving the data itself. An absent port means "server default".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectTarget {
    pub host: String,
    pub port: Option<u16>,
}

impl RedirectTarget {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for RedirectTarget {
    /// `host[:port]`, the form used in tried-target lists and log lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => f.write_str(&self.host),
        }
    }
}

/// Classified result of one underlying open attempt.
///
/// The controller interprets nothing beyond these four classes; `Failed`
/// codes are opaque and pass through to the caller verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The open succeeded.
    Ok,
    /// The open failed with a storage-layer code; not retried.
    Failed(i32),
    /// The server asked the client to wait this many seconds and repeat
    /// the identical request.
    Stall(u32),
    /// The server pointed us at another host.
    Redirect(RedirectTarget),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_intent_requires_verification() {
        assert!(!OpenMode::READ.bypasses_verification());
        assert!(!OpenMode::empty().bypasses_verification());
    }

    #[test]
    fn write_and_create_intents_bypass() {
        assert!(OpenMode::WRITE.bypasses_verification());
        assert!(OpenMode::READ_WRITE.bypasses_verification());
        assert!(OpenMode::CREATE.bypasses_verification());
        assert!(OpenMode::NEW.bypasses_verification());
        assert!(OpenMode::TRUNCATE.bypasses_verification());
        assert!((OpenMode::READ | OpenMode::TRUNCATE).bypasses_verification());
    }

    #[test]
    fn target_display_form() {
        assert_eq!(RedirectTarget::new("node3", Some(1094)).to_string(), "node3:1094");
        assert_eq!(RedirectTarget::new("node3", None).to_string(), "node3");
    }
}
