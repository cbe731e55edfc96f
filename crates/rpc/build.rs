fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/scout.proto");
    println!("cargo:rerun-if-changed=proto/golem.proto");
    println!("cargo:rerun-if-changed=proto/marker.proto");
    tonic_build::configure().build_server(false).compile(
        &["proto/scout.proto", "proto/golem.proto", "proto/marker.proto"],
        &["proto"],
    )?;
    Ok(())
}
