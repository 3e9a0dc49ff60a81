use anyhow::Result;

use crate::cli::TargetArgs;
use crate::commands::{attach_parsed, print_json};

/// List every package with its object count.
pub fn run_packages(target: &TargetArgs, json: bool) -> Result<()> {
    let session = attach_parsed(target)?;
    let packages = session.get_packages()?;

    if json {
        return print_json(&packages);
    }
    for package in &packages {
        println!("{:>6}  {}", package.object_count, package.name);
    }
    println!("{} packages", packages.len());
    Ok(())
}

/// List objects of one category inside a package.
pub fn run_list(target: &TargetArgs, package: &str, category: &str, json: bool) -> Result<()> {
    let session = attach_parsed(target)?;
    let objects = session.get_objects(package, category)?;

    if json {
        return print_json(&objects);
    }
    for object in &objects {
        println!(
            "{:#014x}  {:<14} {}",
            object.address, object.type_name, object.full_name
        );
    }
    println!("{} objects", objects.len());
    Ok(())
}
