//! Binary entrypoint for the `lsdrop` uploader.

use std::process;

#[tokio::main]
async fn main() {
    let exit_code = lsdrop_cli::run().await;
    process::exit(exit_code);
}
