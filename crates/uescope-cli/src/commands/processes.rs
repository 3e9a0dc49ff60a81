use anyhow::Result;
use uescope_core::Session;

/// List running processes, sorted by name.
pub fn run() -> Result<()> {
    let session = Session::new();
    let processes = session.fetch_system_processes();

    if processes.is_empty() {
        println!("No processes found");
        return Ok(());
    }

    for process in &processes {
        println!("{:>8}  {}", process.pid, process.name);
    }
    println!("{} processes", processes.len());
    Ok(())
}
