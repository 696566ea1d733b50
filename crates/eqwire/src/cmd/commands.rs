use eqwire_frame::CommandTable;

use crate::cmd::CommandsArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_commands, OutputFormat};

pub fn run(args: CommandsArgs, format: OutputFormat) -> CliResult<i32> {
    let mut table = CommandTable::new();
    for name in &args.define {
        if table.define(name).is_none() {
            return Err(CliError::new(
                DATA_INVALID,
                format!("no free command id left for '{name}'"),
            ));
        }
    }
    print_commands(&table, format);
    Ok(SUCCESS)
}
