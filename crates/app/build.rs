//! Compiles `shaders/shader.{vert,frag}` into `shaders/{vert,frag}.spv` with
//! `glslc` when it is on `PATH` (or named by `GLSLC`). Without a compiler the
//! existing `.spv` files are used as-is.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADERS: [(&str, &str); 2] = [("shader.vert", "vert.spv"), ("shader.frag", "frag.spv")];

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_default());
    let shader_dir = manifest_dir.join("../../shaders");
    let glslc = env::var("GLSLC").unwrap_or_else(|_| "glslc".to_string());

    println!("cargo:rerun-if-env-changed=GLSLC");

    for (source, output) in SHADERS {
        let source = shader_dir.join(source);
        let output = shader_dir.join(output);
        println!("cargo:rerun-if-changed={}", source.display());

        if !needs_compile(&source, &output) {
            continue;
        }

        match Command::new(&glslc).arg(&source).arg("-o").arg(&output).status() {
            Ok(status) if status.success() => {}
            Ok(status) => panic!("glslc failed for {}: {}", source.display(), status),
            Err(_) => {
                println!(
                    "cargo:warning=glslc not found; {} must be compiled by hand",
                    source.display()
                );
                return;
            }
        }
    }
}

fn needs_compile(source: &Path, output: &Path) -> bool {
    let modified = |path: &Path| std::fs::metadata(path).and_then(|m| m.modified()).ok();
    match (modified(source), modified(output)) {
        (Some(src), Some(out)) => src > out,
        _ => true,
    }
}
