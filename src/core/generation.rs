//! Session generation tagging for asynchronous completions

use tokio::sync::mpsc;

/// Identifies one session; a new connect always gets a new generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A payload stamped with the generation of the session that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tagged<T> {
    pub generation: Generation,
    pub payload: T,
}

/// Sender handed to a session's collaborators
///
/// Everything sent through it carries the session's generation, so the
/// bridge can discard completions that outlive their session.
#[derive(Debug)]
pub struct GenerationSender<T> {
    generation: Generation,
    tx: mpsc::UnboundedSender<Tagged<T>>,
}

impl<T> Clone for GenerationSender<T> {
    fn clone(&self) -> Self {
        Self {
            generation: self.generation,
            tx: self.tx.clone(),
        }
    }
}

impl<T> GenerationSender<T> {
    pub fn new(generation: Generation, tx: mpsc::UnboundedSender<Tagged<T>>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns false once the bridge has gone away
    pub fn send(&self, payload: T) -> bool {
        self.tx
            .send(Tagged {
                generation: self.generation,
                payload,
            })
            .is_ok()
    }
}
