//! CLI command implementations.
//!
//! Each subcommand attaches a fresh session, runs whatever pipeline steps
//! it depends on (discovery, parsing) and prints the result as text or JSON.

pub mod bases;
pub mod browse;
pub mod inspect;
pub mod parse;
pub mod processes;
pub mod search;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;
use uescope_core::{ProgressEvent, Session};

use crate::cli::TargetArgs;

/// Attach a new session to the requested process.
pub fn attach(target: &TargetArgs) -> Result<Session> {
    let session = Session::new();
    let message = session.attach_to_process(target.pid, &target.name)?;
    debug!("{message}");
    Ok(session)
}

/// Attach and bring the full object graph up: discovery plus both parsers,
/// with progress rendered to stderr.
pub fn attach_parsed(target: &TargetArgs) -> Result<Session> {
    let session = attach(target)?;
    session.get_fname_pool_address()?;
    session.get_guobject_array_address()?;
    with_progress(&session, |s| {
        s.parse_fname_pool()?;
        s.parse_guobject_array()
    })?;
    Ok(session)
}

/// Run a parser step while a background thread renders its progress events.
pub fn with_progress<T>(
    session: &Session,
    f: impl FnOnce(&Session) -> uescope_core::Result<T>,
) -> Result<T> {
    let rx = session.events();
    let done = Arc::new(AtomicBool::new(false));
    let done_flag = Arc::clone(&done);

    let printer = thread::spawn(move || loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => print_progress(&event),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if done_flag.load(Ordering::Relaxed) {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    });

    let result = f(session);
    done.store(true, Ordering::Relaxed);
    let _ = printer.join();
    Ok(result?)
}

fn print_progress(event: &ProgressEvent) {
    match event {
        ProgressEvent::NamePool(p) => eprintln!(
            "[names] block {}/{} ({} names)",
            p.current_chunk, p.total_chunks, p.current_names
        ),
        ProgressEvent::ObjectArray(p) => eprintln!(
            "[objects] chunk {}/{} ({}/{} objects)",
            p.current_chunk, p.total_chunks, p.current_objects, p.total_objects
        ),
        ProgressEvent::ProcessSelected { .. } => {}
    }
}

/// Pretty-print any serializable command result.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
