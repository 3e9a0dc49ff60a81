use clap::{Parser, Subcommand};

/// The process a command runs against.
#[derive(Debug, clap::Args)]
pub struct TargetArgs {
    /// PID of the target process
    #[arg(long)]
    pub pid: u32,

    /// Display name of the target process
    #[arg(long, default_value = "target")]
    pub name: String,
}

#[derive(Parser)]
#[command(
    name = "uescope",
    about = "Live-memory object graph inspector for Unreal Engine processes",
    version
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List running processes
    Processes,

    /// Show the target's UE major version
    Version {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Resolve the NamePool, GUObjectArray and GWorld base addresses
    Bases {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Parse the NamePool and report the name count
    Names {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Parse the GUObjectArray and report the object count
    Objects {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// List packages of the parsed object graph
    Packages {
        #[command(flatten)]
        target: TargetArgs,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List objects of one category inside a package
    List {
        #[command(flatten)]
        target: TargetArgs,

        /// Package path, e.g. /Script/Engine
        package: String,

        /// Class, Struct, Enum or Function
        category: String,

        #[arg(long)]
        json: bool,
    },

    /// Search object or member names
    Search {
        #[command(flatten)]
        target: TargetArgs,

        query: String,

        /// Object or Member
        #[arg(long, default_value = "Object")]
        mode: String,

        #[arg(long)]
        json: bool,
    },

    /// Show the detail view of a reflected object
    Details {
        #[command(flatten)]
        target: TargetArgs,

        /// Object address (hex)
        address: String,

        #[arg(long)]
        json: bool,
    },

    /// Resolve a single name id
    Fname {
        #[command(flatten)]
        target: TargetArgs,

        id: u32,
    },

    /// Raw per-offset dump of an arbitrary object address
    Analyze {
        #[command(flatten)]
        target: TargetArgs,

        /// Object address (hex)
        address: String,
    },

    /// Inheritance chain above a live instance
    Inspect {
        #[command(flatten)]
        target: TargetArgs,

        /// Instance address (hex)
        address: String,
    },

    /// Decode live property values of an instance through a class
    Instance {
        #[command(flatten)]
        target: TargetArgs,

        /// Instance address (hex)
        instance: String,

        /// Class address (hex)
        class: String,

        #[arg(long)]
        json: bool,
    },

    /// Expand container elements at an address
    Array {
        #[command(flatten)]
        target: TargetArgs,

        /// Element data address (hex)
        address: String,

        /// Inner property type, e.g. IntProperty
        inner_type: String,

        count: i32,

        #[arg(long)]
        json: bool,
    },

    /// Find instances of a class in the parsed graph
    Instances {
        #[command(flatten)]
        target: TargetArgs,

        /// Class address (hex)
        class: String,
    },
}
