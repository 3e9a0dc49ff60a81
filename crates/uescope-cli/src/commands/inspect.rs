use anyhow::Result;
use uescope_core::session::parse_hex_address;

use crate::cli::TargetArgs;
use crate::commands::{attach_parsed, print_json};

/// Full detail view of a reflected object.
pub fn run_details(target: &TargetArgs, address: &str, json: bool) -> Result<()> {
    let session = attach_parsed(target)?;
    let details = session.get_object_details(parse_hex_address(address)?)?;

    if json {
        return print_json(&details);
    }

    println!("{} ({})", details.full_name, details.type_name);
    println!("address: {:#x}", details.address);

    if !details.inheritance.is_empty() {
        let chain: Vec<&str> = details
            .inheritance
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        println!("inherits: {}", chain.join(" > "));
    }
    if details.properties_size != 0 {
        println!("size: {:#x}", details.properties_size);
    }
    for prop in &details.properties {
        let sub = if prop.sub_type.is_empty() {
            String::new()
        } else {
            format!(" <{}>", prop.sub_type)
        };
        println!(
            "  +{:<8} {:<18} {}{}",
            prop.offset_display(),
            prop.property_type,
            prop.name,
            sub
        );
    }
    for value in &details.enum_values {
        println!("  {} = {}", value.name, value.value);
    }
    if !details.enum_underlying_type.is_empty() {
        println!("underlying: {}", details.enum_underlying_type);
    }
    if let Some(function) = &details.function {
        println!("owner: {}", function.owner);
        println!("exec offset: {:#x}", function.exec_offset);
        for param in &function.params {
            println!("  param {:<18} {}", param.type_name, param.name);
        }
        if !function.return_type.is_empty() {
            println!("  returns {}", function.return_type);
        }
    }
    Ok(())
}

/// Resolve one name id.
pub fn run_fname(target: &TargetArgs, id: u32) -> Result<()> {
    let session = attach_parsed(target)?;
    println!("{}", session.analyze_fname(id)?);
    Ok(())
}

/// Raw per-offset dump of an arbitrary object address.
pub fn run_analyze(target: &TargetArgs, address: &str) -> Result<()> {
    let session = attach_parsed(target)?;
    let raw = session.analyze_object(address)?;
    print_json(&raw)
}

/// Inheritance chain above a live instance.
pub fn run_hierarchy(target: &TargetArgs, address: &str) -> Result<()> {
    let session = attach_parsed(target)?;
    let hierarchy = session.add_inspector(parse_hex_address(address)?)?;

    for (depth, node) in hierarchy.iter().enumerate() {
        println!(
            "{}{} ({:#x})",
            "  ".repeat(depth),
            node.class_name,
            node.class_address
        );
    }
    Ok(())
}

/// Live property values of an instance, decoded through a class.
pub fn run_instance(target: &TargetArgs, instance: &str, class: &str, json: bool) -> Result<()> {
    let session = attach_parsed(target)?;
    let samples =
        session.get_instance_details(parse_hex_address(instance)?, parse_hex_address(class)?)?;

    if json {
        return print_json(&samples);
    }
    print_samples(&samples);
    Ok(())
}

/// Expand container elements at an address.
pub fn run_array(
    target: &TargetArgs,
    address: &str,
    inner_type: &str,
    count: i32,
    json: bool,
) -> Result<()> {
    let session = attach_parsed(target)?;
    let samples = session.get_array_elements(parse_hex_address(address)?, inner_type, count)?;

    if json {
        return print_json(&samples);
    }
    print_samples(&samples);
    Ok(())
}

/// Find instances of a class in the parsed graph.
pub fn run_instances(target: &TargetArgs, class: &str) -> Result<()> {
    let session = attach_parsed(target)?;
    let matches = session.search_object_instances(parse_hex_address(class)?)?;

    for m in &matches {
        println!("{}  {}", m.instance_address, m.object_name);
    }
    println!("{} instances", matches.len());
    Ok(())
}

fn print_samples(samples: &[uescope_core::reflect::InstancePropertySample]) {
    for sample in samples {
        let marker = if sample.is_object { " *" } else { "" };
        println!(
            "  +{:<8} {:<18} {:<24} = {}{}",
            sample.offset, sample.property_type, sample.property_name, sample.live_value, marker
        );
    }
}
