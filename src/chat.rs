//! Interactive terminal front end.
//!
//! Shows what was indexed, then reads questions until `exit` or end of input.
//! Labels follow the configured answer language.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use repo_chat_core::engine::Language;
use repo_chat_core::select::FileSelector;
use repo_chat_core::session::{Session, TranscriptSink, Turn};

const DIVIDER: &str = "────────────────────────────────────────";

pub fn loading_message(language: Language) -> &'static str {
    match language {
        Language::Japanese => "リポジトリを読み込んでいます...",
        Language::English => "Loading repository...",
    }
}

fn prompt_hint(language: Language) -> &'static str {
    match language {
        Language::Japanese => "質問を入力してください...",
        Language::English => "Enter your Question...",
    }
}

fn goodbye(language: Language) -> &'static str {
    match language {
        Language::Japanese => "終了します。",
        Language::English => "Bye.",
    }
}

/// Describe the indexed corpus.
pub fn banner(language: Language, clone_url: &str, branch: &str, selector: &FileSelector) -> String {
    let exts = describe(&selector.extensions);
    let dirs = describe(&selector.fragments);
    match language {
        Language::Japanese => format!(
            "{}の{}ブランチで、{}にある拡張子が{}のファイルを学習済みです",
            clone_url, branch, dirs, exts
        ),
        Language::English => format!(
            "{} files in {} on the {} branch from {}",
            exts, dirs, branch, clone_url
        ),
    }
}

fn describe(items: &[String]) -> String {
    if items.is_empty() {
        "*".to_string()
    } else {
        items.join(", ")
    }
}

pub async fn run<S, R, W>(
    session: &mut Session<S>,
    banner: &str,
    input: R,
    output: &mut W,
) -> Result<()>
where
    S: TranscriptSink,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let language = session.engine().language();
    let mut lines = input.lines();

    write(output, &format!("{}\n{}\n", banner, DIVIDER)).await?;

    loop {
        write(output, &format!("{}\n> ", prompt_hint(language))).await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match session.submit(&line).await {
            Turn::Exit | Turn::Closed => break,
            Turn::Ignored => {}
            Turn::Answered(answer) => {
                let text = format!(
                    "Q: {}\nA: {}\n{}\n",
                    line.trim(),
                    answer.display_text().trim(),
                    DIVIDER
                );
                write(output, &text).await?;
            }
            Turn::Failed(e) => write(output, &format!("Error: {}\n{}\n", e, DIVIDER)).await?,
        }
    }

    session.terminate();
    write(output, &format!("\n{}\n", goodbye(language))).await
}

async fn write<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}
