//! CLI domain: parse, route, output and presentation only.
//! Everything the commands do is delegated to the context engine.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::{
    format_build_json, format_build_text, format_lookup_json, format_lookup_text,
    format_routes_table,
};
pub use route::RunContext;
