use crate::handlers::DEFAULT_DB_DIR;
use clap::{arg, command};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

fn session_arg() -> clap::Arg {
    arg!(-s --"session" <ID>)
        .required(true)
        .help("The session the nodes belong to")
        .value_parser(clap::value_parser!(i64))
}

fn parent_arg() -> clap::Arg {
    arg!(-p --"parent" <ID>)
        .required(false)
        .help("Parent node id (0 for top-level nodes)")
        .value_parser(clap::value_parser!(i64))
        .default_value("0")
}

fn node_id_arg() -> clap::Arg {
    arg!(-i --"id" <ID>)
        .required(true)
        .help("The node id")
        .value_parser(clap::value_parser!(i64))
}

fn method_arg() -> clap::Arg {
    arg!(-m --"method" <METHOD>)
        .required(false)
        .help("HTTP method")
        .default_value("GET")
}

fn history_arg() -> clap::Arg {
    arg!(-H --"history" <ID>)
        .required(false)
        .help("Id of the HTTP history record that produced the node")
        .value_parser(clap::value_parser!(i32))
}

fn json_arg() -> clap::Arg {
    arg!(--"json")
        .required(false)
        .help("Print nodes as JSON")
        .action(clap::ArgAction::SetTrue)
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("arbor")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("arbor")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(arg!(-v --"verbose" "Log storage activity to stderr").required(false))
        .arg(
            arg!(--"db" <DIR>)
                .required(false)
                .global(true)
                .help("Directory holding the arbor database")
                .default_value(DEFAULT_DB_DIR),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the arbor database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the arbor database (default: --db)"),
                )
                .arg(
                    arg!(-f --"force")
                        .help(
                            "Forces the overwriting of any existing database at the specified \
                        location.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("node")
                .about("Read and write individual structure nodes")
                .subcommand_required(true)
                .subcommand(
                    command!("insert")
                        .about("Inserts a new node")
                        .arg(session_arg())
                        .arg(parent_arg())
                        .arg(history_arg())
                        .arg(
                            arg!(-n --"name" <NAME>)
                                .required(true)
                                .help("Lookup name of the node, usually the URL path"),
                        )
                        .arg(
                            arg!(-u --"url" <URL>)
                                .required(true)
                                .help("Full request URL"),
                        )
                        .arg(method_arg())
                        .arg(json_arg()),
                )
                .subcommand(
                    command!("read")
                        .about("Reads a node by id")
                        .arg(session_arg())
                        .arg(node_id_arg())
                        .arg(json_arg()),
                )
                .subcommand(
                    command!("find")
                        .about("Finds a node by name and method")
                        .arg(session_arg())
                        .arg(
                            arg!(-n --"name" <NAME>)
                                .required(true)
                                .help("Lookup name of the node"),
                        )
                        .arg(method_arg())
                        .arg(json_arg()),
                )
                .subcommand(
                    command!("children")
                        .about("Lists the direct children of a node")
                        .arg(session_arg())
                        .arg(parent_arg())
                        .arg(json_arg()),
                )
                .subcommand(
                    command!("count")
                        .about("Counts the direct children of a node")
                        .arg(session_arg())
                        .arg(parent_arg()),
                )
                .subcommand(
                    command!("delete")
                        .about("Deletes a childless node, or a whole subtree with --subtree")
                        .arg(session_arg())
                        .arg(node_id_arg())
                        .arg(
                            arg!(--"subtree")
                                .required(false)
                                .help("Delete the node and all of its descendants")
                                .action(clap::ArgAction::SetTrue),
                        ),
                ),
        )
        .subcommand(
            command!("map")
                .about("Build and display a session's site map")
                .subcommand_required(true)
                .subcommand(
                    command!("add")
                        .about("Records a request, creating the host and folder nodes leading to it")
                        .arg(session_arg())
                        .arg(
                            arg!(-u --"url" <URL>)
                                .required(true)
                                .help("The request URL"),
                        )
                        .arg(method_arg())
                        .arg(history_arg()),
                )
                .subcommand(
                    command!("tree")
                        .about("Prints the site map of a session")
                        .arg(session_arg())
                        .arg(
                            arg!(-f --"format" <FORMAT>)
                                .required(false)
                                .help("Output format: text, json")
                                .value_parser(["text", "json"])
                                .default_value("text"),
                        ),
                ),
        )
        .subcommand(
            command!("session")
                .about("Whole-session bookkeeping")
                .subcommand_required(true)
                .subcommand(
                    command!("stats")
                        .about("Shows how many nodes a session holds")
                        .arg(session_arg()),
                )
                .subcommand(
                    command!("drop")
                        .about("Deletes every node of a session")
                        .arg(session_arg()),
                ),
        )
}
