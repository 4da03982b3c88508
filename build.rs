//! Build script for compiling protobuf definitions

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Compile proto files. Use protox (pure-Rust parser) to produce the file
    // descriptor set so no external `protoc` binary is required, then hand the
    // descriptors to prost-build to generate the same Rust types.
    let file_descriptors = protox::compile(["proto/jalaio.proto"], ["proto/"])?;
    prost_build::Config::new().compile_fds(file_descriptors)?;

    // Rerun if proto files change
    println!("cargo:rerun-if-changed=proto/jalaio.proto");

    Ok(())
}
