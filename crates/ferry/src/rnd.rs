// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::time::Duration;

/// Source of randomness for jitter.
///
/// Not cryptographically secure. Tests swap in a scripted generator to make jitter
/// deterministic.
#[derive(Clone, Default)]
pub(crate) enum Rnd {
    #[default]
    Real,

    #[cfg(test)]
    Scripted(std::sync::Arc<dyn Fn() -> f64 + Send + Sync>),
}

impl Debug for Rnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real => write!(f, "Real"),
            #[cfg(test)]
            Self::Scripted(_) => write!(f, "Scripted"),
        }
    }
}

impl Rnd {
    /// Always yields `value`.
    #[cfg(test)]
    pub(crate) fn fixed(value: f64) -> Self {
        Self::Scripted(std::sync::Arc::new(move || value))
    }

    /// Yields the given values in order, repeating the sequence.
    #[cfg(test)]
    pub(crate) fn sequence(values: impl Into<Vec<f64>>) -> Self {
        let values = values.into();
        let next = std::sync::atomic::AtomicUsize::new(0);
        Self::Scripted(std::sync::Arc::new(move || {
            let index = next.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            values.get(index % values.len().max(1)).copied().unwrap_or_default()
        }))
    }

    /// A value in `[0, 1)`.
    pub(crate) fn next_f64(&self) -> f64 {
        match self {
            Self::Real => fastrand::f64(),
            #[cfg(test)]
            Self::Scripted(generator) => generator(),
        }
    }

    /// Returns `base` shifted up or down by a uniform fraction of `spread`.
    ///
    /// The magnitude is drawn first and the sign second; a sign draw above one half
    /// subtracts. The result saturates at zero.
    pub(crate) fn jitter(&self, base: Duration, spread: Duration) -> Duration {
        let offset = scale(spread, self.next_f64().clamp(0.0, 1.0));

        if self.next_f64() > 0.5 {
            base.saturating_sub(offset)
        } else {
            base.saturating_add(offset)
        }
    }
}

/// Multiplies `duration` by `factor` in `[0, 1]`, keeping `duration` when the float product
/// no longer fits.
pub(crate) fn scale(duration: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(duration.as_secs_f64() * factor).unwrap_or(duration)
}
