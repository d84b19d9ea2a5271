//! Line protocol for driving a session from another process.
//!
//! ```text
//! → ready!
//! ← <question>
//! → <answer, newlines removed>
//! → ready!
//! ← exit
//! → Processing... done!
//! ```
//!
//! `ready!` is written once the index is built and after every turn. A failed
//! turn writes `error: <message>` in place of the answer. Blank input lines
//! are acknowledged with another `ready!`. End of input ends the session like
//! `exit` does.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use repo_chat_core::models::strip_newlines;
use repo_chat_core::session::{Session, TranscriptSink, Turn};

pub const READY: &str = "ready!";
pub const DONE: &str = "Processing... done!";

pub async fn run<S, R, W>(session: &mut Session<S>, input: R, output: &mut W) -> Result<()>
where
    S: TranscriptSink,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    emit(output, READY).await?;

    while let Some(line) = lines.next_line().await? {
        match session.submit(&line).await {
            Turn::Exit | Turn::Closed => break,
            Turn::Ignored => {}
            Turn::Answered(answer) => emit(output, &answer.display_text()).await?,
            Turn::Failed(e) => emit(output, &format!("error: {}", strip_newlines(&e.to_string()))).await?,
        }
        emit(output, READY).await?;
    }

    session.terminate();
    emit(output, DONE).await
}

async fn emit<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
