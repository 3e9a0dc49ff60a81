use anyhow::Result;

use crate::cli::TargetArgs;
use crate::commands::{attach, with_progress};

/// Parse the NamePool and report how many names it held.
pub fn run_names(target: &TargetArgs) -> Result<()> {
    let session = attach(target)?;
    session.get_fname_pool_address()?;

    let count = with_progress(&session, |s| s.parse_fname_pool())?;
    println!("NamePool: {count} names");
    Ok(())
}

/// Parse the GUObjectArray (NamePool first, it feeds enrichment) and report
/// the live object count.
pub fn run_objects(target: &TargetArgs) -> Result<()> {
    let session = attach(target)?;
    session.get_fname_pool_address()?;
    session.get_guobject_array_address()?;

    let count = with_progress(&session, |s| {
        s.parse_fname_pool()?;
        s.parse_guobject_array()
    })?;
    println!("GUObjectArray: {count} objects");
    Ok(())
}
