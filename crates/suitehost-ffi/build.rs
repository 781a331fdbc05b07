//! Generates `include/suitehost.h` for C hosts and plugins.

use std::error::Error;
use std::path::PathBuf;

const HEADER: &str = "suitehost.h";

fn main() -> Result<(), Box<dyn Error>> {
    let crate_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);
    let config_path = crate_dir.join("cbindgen.toml");

    println!("cargo:rerun-if-changed={}", config_path.display());
    println!("cargo:rerun-if-changed=src");

    let config = cbindgen::Config::from_file(&config_path)
        .map_err(|e| format!("reading {}: {e}", config_path.display()))?;

    let include_dir = crate_dir.join("include");
    std::fs::create_dir_all(&include_dir)?;

    let bindings = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()?;
    bindings.write_to_file(include_dir.join(HEADER));
    Ok(())
}
