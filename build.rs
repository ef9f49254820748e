use std::{fs, io};

const PROTO_DIR: &str = "./protos/";
const GENERATED_DIR: &str = "./generated/";

fn main() -> io::Result<()> {
    // `src/lib.rs` includes the generated module from this directory.
    fs::create_dir_all(GENERATED_DIR)?;

    println!("cargo:rerun-if-changed={}replichat.proto", PROTO_DIR);
    tonic_build::configure()
        .out_dir(GENERATED_DIR)
        .compile(&["./protos/replichat.proto"], &[PROTO_DIR])
}
