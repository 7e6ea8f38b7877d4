//! `signdata schema` - Print the built-in payload schema.

use clap::Args;

use signdata_core::ARC60_SIMPLE_SCHEMA;

use crate::exit_codes;

#[derive(Args, Debug)]
pub struct SchemaArgs {}

pub fn cmd_schema(_args: SchemaArgs) -> i32 {
    println!("{}", ARC60_SIMPLE_SCHEMA.trim_end());
    exit_codes::SUCCESS
}
