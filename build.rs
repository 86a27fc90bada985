//! Renders the `sheetstream(1)` man page into `OUT_DIR` at build time.

use std::{env, fs, io, path::PathBuf};

use clap::CommandFactory;

#[path = "src/cli.rs"]
mod cli;

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::other("OUT_DIR not set by cargo"))?;

    let mut rendered = Vec::new();
    clap_mangen::Man::new(cli::Cli::command()).render(&mut rendered)?;
    fs::write(out_dir.join("sheetstream.1"), rendered)
}
