// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::shared::duration::format_duration;
use crate::shared::error::{AstraError, Result};
use backon::{BackoffBuilder, ConstantBuilder};
use std::future::Future;
use std::time::Duration;

/// Call `check` every `interval` until it returns true or `timeout` elapses.
///
/// Errors from `check` end the wait immediately.
pub async fn poll_until<F, Fut>(what: &str, interval: Duration, timeout: Duration, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let attempts = (timeout.as_millis() / interval.as_millis().max(1)).max(1) as usize;
    let mut delays = ConstantBuilder::default()
        .with_delay(interval)
        .with_max_times(attempts)
        .build();

    loop {
        if check().await? {
            return Ok(());
        }
        match delays.next() {
            Some(delay) => {
                tracing::trace!("waiting {:?} for {}", delay, what);
                tokio::time::sleep(delay).await;
            }
            None => {
                return Err(AstraError::Timeout(format!(
                    "{} not ready after {}",
                    what,
                    format_duration(timeout)
                )))
            }
        }
    }
}
