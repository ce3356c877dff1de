//! Short-lived secrets handed from the gate to the credential mechanism.

use std::fmt;

use zeroize::Zeroizing;

/// A password held for exactly one elevation attempt.
///
/// The backing buffer is wiped when the value is dropped. There is no
/// `Clone`, `Display` or serde impl, so the secret can only leave through
/// [`Credential::expose`].
pub struct Credential(Zeroizing<String>);

#[cfg(test)]
thread_local! {
    static LIVE: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Credentials created and not yet dropped on this thread.
#[cfg(test)]
pub(crate) fn live() -> usize {
    LIVE.with(|n| n.get())
}

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        #[cfg(test)]
        LIVE.with(|n| n.set(n.get() + 1));
        Self(Zeroizing::new(secret.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Secret followed by a newline, for writing to a password prompt.
    pub(crate) fn as_line(&self) -> Zeroizing<Vec<u8>> {
        let mut line = Zeroizing::new(Vec::with_capacity(self.0.len() + 1));
        line.extend_from_slice(self.0.as_bytes());
        line.push(b'\n');
        line
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[cfg(test)]
impl Drop for Credential {
    fn drop(&mut self) {
        LIVE.with(|n| n.set(n.get() - 1));
    }
}
