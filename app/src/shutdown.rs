use std::fmt;
use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

/// Why the host loop stopped.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StopReason {
    Interrupt,
    QuitKey,
    RunLimit,
}

impl StopReason {
    fn code(self) -> u8 {
        match self {
            Self::Interrupt => 1,
            Self::QuitKey => 2,
            Self::RunLimit => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Interrupt),
            2 => Some(Self::QuitKey),
            3 => Some(Self::RunLimit),
            _ => None,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "interrupt",
            Self::QuitKey => "quit-key",
            Self::RunLimit => "run-limit",
        })
    }
}

/// Stop request shared by Ctrl-C, key handlers and the host loop.
/// The first reason recorded wins.
#[derive(Clone)]
pub struct ShutdownFlag {
    reason: Arc<AtomicU8>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self {
            reason: Arc::new(AtomicU8::new(0)),
        }
    }

    pub fn request(&self, reason: StopReason) -> bool {
        self.reason
            .compare_exchange(0, reason.code(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn reason(&self) -> Option<StopReason> {
        StopReason::from_code(self.reason.load(Ordering::Acquire))
    }

    pub fn is_set(&self) -> bool {
        self.reason().is_some()
    }

    pub fn install_ctrlc(&self) -> anyhow::Result<()> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            flag.request(StopReason::Interrupt);
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reason_wins() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_set());

        assert!(flag.request(StopReason::QuitKey));
        assert!(!flag.clone().request(StopReason::RunLimit));
        assert_eq!(flag.reason(), Some(StopReason::QuitKey));
        assert_eq!(flag.reason().map(|r| r.to_string()).as_deref(), Some("quit-key"));
    }
}
