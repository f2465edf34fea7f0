// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Shortest pause between two launches; shorter backoff waits are rounded up to it.
pub(super) const MIN_HEDGE_INTERVAL: Duration = Duration::from_millis(1);
