use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    // Put the memory layout somewhere the linker can find it
    let out = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR not set"));
    fs::copy("memory.x", out.join("memory.x")).expect("copy memory.x");
    println!("cargo:rustc-link-search={}", out.display());

    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    if env::var_os("CARGO_FEATURE_DEFMT").is_some() {
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }

    // Only re-run the build script when the memory layout changes,
    // instead of when any part of the source code changes.
    println!("cargo:rerun-if-changed=memory.x");
}
