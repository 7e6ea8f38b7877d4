pub mod keygen;
pub mod schema;
pub mod sign;
pub mod verify;

use super::args::{Cli, Command};

pub async fn dispatch(cli: Cli) -> i32 {
    match cli.cmd {
        Command::Keygen(args) => keygen::cmd_keygen(args),
        Command::Sign(args) => sign::cmd_sign(args).await,
        Command::Verify(args) => verify::cmd_verify(args),
        Command::Schema(args) => schema::cmd_schema(args),
    }
}
