use std::{env, path::PathBuf};

const FIXTURE_DIR_PATH: &str = "test-dylib";
const FIXTURE_FILE_NAME: &str = "hook_target.c";
const FIXTURE_LIB_NAME: &str = "libhook_target.so";

/// Builds the C library the hook tests patch. A missing C compiler only
/// skips the tests that need it.
fn compile_fixture(out_dir: &PathBuf) {
    let source = PathBuf::from(FIXTURE_DIR_PATH).join(FIXTURE_FILE_NAME);
    println!("cargo:rerun-if-changed={}", source.display());

    let compiler = match cc::Build::new().cargo_metadata(false).try_get_compiler() {
        Ok(compiler) => compiler,
        Err(err) => {
            println!("cargo:warning=skipping {FIXTURE_LIB_NAME}: {err}");
            return;
        }
    };
    let mut cmd = compiler.to_command();
    cmd.arg("-shared")
        .arg("-fPIC")
        .arg("-O1")
        .arg("-o")
        .arg(out_dir.join(FIXTURE_LIB_NAME))
        .arg(&source);
    match cmd.status() {
        Ok(status) if status.success() => {}
        Ok(status) => println!("cargo:warning=skipping {FIXTURE_LIB_NAME}: compiler exited with {status}"),
        Err(err) => println!("cargo:warning=skipping {FIXTURE_LIB_NAME}: {err}"),
    }
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    compile_fixture(&out_dir);
    println!("cargo:rustc-env=TEST_ARTIFACTS={}", out_dir.display());
}
