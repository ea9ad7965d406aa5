//! Interactive chat REPL.
//!
//! Reads questions from `input`, streams answers to `output` fragment by
//! fragment. Exits on `:q` or EOF. A failed turn prints the error and keeps
//! the loop alive.

use std::io::{BufRead, Write};

use anyhow::Result;

use crate::chat::{ChatContext, TurnContext};

pub const QUIT_COMMAND: &str = ":q";
pub const CLEAR_COMMAND: &str = ":clear";
pub const HISTORY_COMMAND: &str = ":history";
pub const PROMPT_PREFIX: &str = "you> ";
pub const ASSISTANT_PREFIX: &str = "assistant> ";

/// Runs the interactive chat loop.
pub async fn run_repl<R, W>(
    input: R,
    output: &mut W,
    ctx: &mut ChatContext,
    turn: &TurnContext,
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed == QUIT_COMMAND {
            writeln!(output, "Goodbye!")?;
            break;
        }

        if trimmed.is_empty() {
            prompt(output)?;
            continue;
        }

        if trimmed == CLEAR_COMMAND {
            ctx.clear().await;
            writeln!(output, "Conversation cleared.")?;
            prompt(output)?;
            continue;
        }

        if trimmed == HISTORY_COMMAND {
            match ctx.load_history().await {
                Ok(()) => {
                    for message in ctx.messages() {
                        writeln!(output, "{}> {}", message.role, message.content)?;
                    }
                }
                Err(e) => writeln!(output, "Error: {e:#}")?,
            }
            prompt(output)?;
            continue;
        }

        let mut printed_prefix = false;
        let result = ctx
            .ask_with(trimmed, turn, |piece| {
                if !printed_prefix {
                    let _ = write!(output, "{ASSISTANT_PREFIX}");
                    printed_prefix = true;
                }
                let _ = write!(output, "{piece}");
                let _ = output.flush();
            })
            .await;

        match result {
            Ok(_) => {
                if printed_prefix {
                    writeln!(output)?;
                }
            }
            Err(e) => {
                if printed_prefix {
                    writeln!(output)?;
                }
                writeln!(output, "Error: {e:#}")?;
            }
        }

        prompt(output)?;
    }

    Ok(())
}

fn prompt<W: Write>(output: &mut W) -> Result<()> {
    write!(output, "{PROMPT_PREFIX}")?;
    output.flush()?;
    Ok(())
}
