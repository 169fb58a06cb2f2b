//! Cyclic collection of service credentials.
//!
//! The ring hands out credentials round-robin and shrinks as credentials are
//! found to be invalid or out of quota. An empty ring is terminal: every
//! request for a credential fails with [`CompressionError::RingExhausted`].

use crate::error::{CompressionError, Result};
use std::fmt;

/// An opaque service secret. Formatting only ever shows a masked identity.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Last four characters of the secret, enough to tell keys apart in logs.
    pub fn identity(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        format!("…{}", tail)
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.identity())
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    keys: Vec<Credential>,
    cursor: usize,
    last_returned: Option<usize>,
}

impl KeyRing {
    pub fn new(keys: Vec<Credential>) -> Self {
        Self {
            keys,
            cursor: 0,
            last_returned: None,
        }
    }

    pub fn from_secrets<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(secrets.into_iter().map(Credential::new).collect())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.keys
    }

    /// Peeks at the credential under the cursor without advancing.
    pub fn get(&self) -> Result<&Credential> {
        self.keys
            .get(self.cursor)
            .ok_or(CompressionError::RingExhausted)
    }

    /// Returns the credential under the cursor and advances, wrapping past the end.
    pub fn next(&mut self) -> Result<Credential> {
        let current = self.get()?.clone();
        self.last_returned = Some(self.cursor);
        self.cursor = (self.cursor + 1) % self.keys.len();
        Ok(current)
    }

    /// Removes `credential`, or the one most recently returned by [`KeyRing::next`]
    /// when `None`. Returns whether anything was removed.
    ///
    /// Removing an entry before the cursor shifts the cursor left so the same
    /// credential stays up next.
    pub fn delete(&mut self, credential: Option<&Credential>) -> bool {
        let index = match credential {
            Some(target) => self.keys.iter().position(|k| k == target),
            None => self.last_returned.filter(|&i| i < self.keys.len()),
        };
        let Some(index) = index else {
            return false;
        };

        self.keys.remove(index);
        self.last_returned = None;
        if index < self.cursor {
            self.cursor -= 1;
        }
        if self.cursor >= self.keys.len() {
            self.cursor = 0;
        }
        true
    }
}
