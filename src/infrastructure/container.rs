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

//! Types shared by the Kubernetes and Podman backends.

use crate::shared::error::Result;
use futures::Stream;
use std::pin::Pin;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Lines of container output.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Collect a reader to a string, echoing each chunk when `echo` is set.
pub(crate) async fn drain<R>(reader: Option<R>, echo: bool, to_stderr: bool) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(String::new());
    };

    let mut collected = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        if echo {
            if to_stderr {
                let mut err = tokio::io::stderr();
                err.write_all(&buf[..n]).await?;
                err.flush().await?;
            } else {
                let mut out = tokio::io::stdout();
                out.write_all(&buf[..n]).await?;
                out.flush().await?;
            }
        }
        collected.extend_from_slice(&buf[..n]);
    }
    Ok(String::from_utf8_lossy(&collected).into_owned())
}

/// Lines of a buffered reader. The stream ends after the first read error.
pub(crate) fn lines_stream<R>(reader: R) -> LineStream
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    Box::pin(futures::stream::unfold(
        Some(reader.lines()),
        |state| async move {
            let mut lines = state?;
            match lines.next_line().await {
                Ok(Some(line)) => Some((Ok(line), Some(lines))),
                Ok(None) => None,
                Err(e) => Some((Err(e.into()), None)),
            }
        },
    ))
}

/// Wrap a command line for `sh -c`, changing to `working_dir` first.
pub fn shell_command(command_line: &str, working_dir: Option<&str>) -> Vec<String> {
    let script = match working_dir {
        Some(dir) if !dir.is_empty() => format!("cd {} && ({})", dir, command_line),
        _ => command_line.to_string(),
    };
    vec!["/bin/sh".to_string(), "-c".to_string(), script]
}

/// Like `shell_command`, but detached from the exec session with output sent to
/// the container's main process so that it shows up in the container logs.
pub fn background_command(command_line: &str, working_dir: Option<&str>) -> Vec<String> {
    let inner = match working_dir {
        Some(dir) if !dir.is_empty() => format!("cd {} && ({})", dir, command_line),
        _ => format!("({})", command_line),
    };
    vec![
        "/bin/sh".to_string(),
        "-c".to_string(),
        format!("nohup sh -c '{}' 1>>/proc/1/fd/1 2>>/proc/1/fd/2 &", inner.replace('\'', "'\\''")),
    ]
}
