// Copyright (c) The dart2junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use color_eyre::Result;
use dart2junit::Dart2JunitApp;

fn main() -> Result<()> {
    color_eyre::install()?;

    let app = Dart2JunitApp::parse();
    app.init_output();

    match app.exec() {
        Ok(()) => Ok(()),
        Err(error) => {
            error.display_to_stderr();
            std::process::exit(error.process_exit_code())
        }
    }
}
