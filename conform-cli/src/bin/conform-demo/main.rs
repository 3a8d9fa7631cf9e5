// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A small in-memory suite that exercises the conform runner end to end.

mod suite;

use clap::Parser;
use color_eyre::Result;
use conform_cli::SuiteApp;

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = enable_ansi_support::enable_ansi_support();

    let app = SuiteApp::parse();
    let output = app.init_output();
    let mut env = suite::MemoryEnv::new(app.second_server());

    let stdout = std::io::stdout();
    match app.exec(suite::build(), &mut env, output, &mut stdout.lock()) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr(&output.stderr_styles());
            std::process::exit(error.process_exit_code())
        }
    }
}
