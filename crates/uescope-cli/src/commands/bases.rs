use anyhow::Result;

use crate::cli::TargetArgs;
use crate::commands::attach;

/// Print the target's UE major version and the selected layout profile.
pub fn run_version(target: &TargetArgs) -> Result<()> {
    let session = attach(target)?;
    let version = session.get_ue_version()?;
    let profile = session.layout_profile()?;

    println!("UE version: {version}");
    println!(
        "Layout: {:?}{}",
        profile.generation,
        if profile.degraded { " (degraded)" } else { "" }
    );
    Ok(())
}

/// Resolve and print all three registry base addresses.
pub fn run(target: &TargetArgs) -> Result<()> {
    let session = attach(target)?;
    let block = session.show_base_address()?;
    println!("{block}");
    Ok(())
}
