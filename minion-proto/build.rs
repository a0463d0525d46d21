fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Ensure protoc is available via vendored binary for reproducible builds
    if let Ok(path) = protoc_bin_vendored::protoc_bin_path() {
        std::env::set_var("PROTOC", path);
    }

    println!("cargo:rerun-if-changed=proto");

    // Messages only: the robot API runs over a raw length-prefixed TCP stream, not gRPC.
    tonic_build::configure()
        .build_server(false)
        .build_client(false)
        .compile(
            &[
                "proto/materials.proto",
                "proto/robot_api.proto",
                "proto/robot_storage.proto",
            ],
            &["proto"],
        )?;
    Ok(())
}
