// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::RetryAfterUnit;

/// First wait used when a 429 response carries no `Retry-After` header.
///
/// Doubles with every further 429 of the same request.
pub(super) const DEFAULT_BACKOFF_SEED: Duration = Duration::from_millis(20);

/// `Retry-After` is expressed in seconds by HTTP.
pub(super) const DEFAULT_HEADER_UNIT: RetryAfterUnit = RetryAfterUnit::Seconds;
