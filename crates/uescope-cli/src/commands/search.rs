use anyhow::Result;

use crate::cli::TargetArgs;
use crate::commands::{attach_parsed, print_json};

/// Global search over object names or member names.
pub fn run(target: &TargetArgs, query: &str, mode: &str, json: bool) -> Result<()> {
    let session = attach_parsed(target)?;
    let hits = session.global_search(query, mode)?;

    if json {
        return print_json(&hits);
    }
    for hit in &hits {
        match &hit.member_name {
            Some(member) => println!(
                "{:#014x}  {:<14} {}::{}  [{}]",
                hit.address, hit.type_name, hit.object_name, member, hit.package_name
            ),
            None => println!(
                "{:#014x}  {:<14} {}  [{}]",
                hit.address, hit.type_name, hit.object_name, hit.package_name
            ),
        }
    }
    println!("{} hits", hits.len());
    Ok(())
}
