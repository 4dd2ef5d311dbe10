//! Local LM command invocation.
//!
//! An LM is any command that reads a prompt on stdin and answers on stdout.
//! Command arguments may carry placeholders (such as `{image}`) that are
//! filled per call after the command is split.
use anyhow::{anyhow, Context, Result};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Instant;

/// Run `command` with `prompt` on stdin and return its non-empty stdout.
pub fn invoke_lm_command(command: &str, prompt: &str, vars: &[(&str, &str)]) -> Result<String> {
    let args = shell_words::split(command)
        .with_context(|| format!("parse LM command: {command}"))?
        .into_iter()
        .map(|arg| {
            vars.iter()
                .fold(arg, |arg, &(key, value)| arg.replace(key, value))
        })
        .collect::<Vec<_>>();
    let Some((program, rest)) = args.split_first() else {
        return Err(anyhow!("LM command is empty"));
    };

    let start = Instant::now();
    let mut child = Command::new(program)
        .args(rest)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawn LM command: {program}"))?;

    // The prompt is fed from its own thread while stdout and stderr drain,
    // so an LM that answers before reading all input cannot block on us.
    let stdin = child.stdin.take();
    let (fed, output) = thread::scope(|scope| {
        let feeder = scope.spawn(move || match stdin {
            Some(mut stdin) => stdin.write_all(prompt.as_bytes()),
            None => Ok(()),
        });
        let output = child.wait_with_output();
        (feeder.join(), output)
    });
    let output = output.context("wait for LM command")?;
    tracing::info!(
        elapsed_ms = start.elapsed().as_millis(),
        prompt_bytes = prompt.len(),
        response_bytes = output.stdout.len(),
        "lm invoke complete"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "LM command failed with status {}: {}",
            output.status,
            stderr.trim()
        ));
    }
    match fed {
        Ok(Ok(())) => {}
        Ok(Err(err)) if err.kind() == ErrorKind::BrokenPipe => {
            tracing::debug!("LM command exited before reading the whole prompt");
        }
        Ok(Err(err)) => return Err(err).context("write prompt to LM stdin"),
        Err(_) => return Err(anyhow!("prompt writer thread panicked")),
    }

    let text = String::from_utf8(output.stdout).context("decode LM stdout as UTF-8")?;
    if text.trim().is_empty() {
        return Err(anyhow!("LM command returned an empty response"));
    }
    Ok(text)
}

/// The JSON payload of a response, with any Markdown code fence removed.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();
    let Some(open) = text.find("```") else {
        return text;
    };
    let after_fence = &text[open + 3..];
    // Drop the info string (`json`, or nothing) that ends the opening line.
    let body = after_fence
        .find('\n')
        .map_or(after_fence, |newline| &after_fence[newline + 1..]);
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => text,
    }
}
