//! Build script — links `libespeak-ng` when the `onnx` feature is enabled.
//!
//! The default build drives Piper and MeloTTS through their command-line
//! tools and needs no native library, so nothing is emitted unless cargo
//! sets `CARGO_FEATURE_ONNX`.
//!
//! ## Resolution order
//!
//! 1. **`ESPEAK_LIB_DIR`** env var — explicit directory containing
//!    `libespeak-ng.{a,so,dylib}`.
//! 2. **pkg-config** — `pkg-config --libs espeak-ng`.
//! 3. **Path walk** — Homebrew prefixes on macOS; the multi-arch directory,
//!    `/usr/lib64`, `/usr/lib` and `/usr/local/lib` on Linux.
//!
//! A static archive is preferred over the shared library at every step; when
//! one is linked the C++ runtime is added because espeak-ng is C++.

use std::path::Path;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=ESPEAK_LIB_DIR");
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");

    if std::env::var_os("CARGO_FEATURE_ONNX").is_none() {
        return;
    }

    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    if let Ok(dir) = std::env::var("ESPEAK_LIB_DIR") {
        if !link_from_dir(&dir, &target_os) {
            panic!("ESPEAK_LIB_DIR={dir} does not contain libespeak-ng");
        }
        return;
    }

    if try_pkg_config() {
        return;
    }

    for dir in candidate_dirs(&target_os, &target_arch) {
        if link_from_dir(&dir, &target_os) {
            return;
        }
    }

    panic!(
        "\n\n\
         ttsgate: the `onnx` feature needs libespeak-ng.\n\
         \n\
         \t  macOS   :  brew install espeak-ng\n\
         \t  Ubuntu  :  sudo apt install libespeak-ng-dev\n\
         \t  Alpine  :  apk add espeak-ng-dev\n\
         \n\
         Or point the build script at the library:\n\
         \n\
         \t  ESPEAK_LIB_DIR=/your/path/lib cargo build --features onnx\n\n"
    );
}

/// Emit link directives for the library inside `dir`; `false` if absent.
fn link_from_dir(dir: &str, target_os: &str) -> bool {
    let dylib = if target_os == "macos" { "libespeak-ng.dylib" } else { "libespeak-ng.so" };
    if Path::new(dir).join("libespeak-ng.a").exists() {
        println!("cargo:rustc-link-search=native={dir}");
        println!("cargo:rustc-link-lib=static=espeak-ng");
        let cxx = if target_os == "macos" { "c++" } else { "stdc++" };
        println!("cargo:rustc-link-lib=dylib={cxx}");
        true
    } else if Path::new(dir).join(dylib).exists() {
        println!("cargo:rustc-link-search=native={dir}");
        println!("cargo:rustc-link-lib=dylib=espeak-ng");
        true
    } else {
        false
    }
}

fn try_pkg_config() -> bool {
    let Ok(out) = Command::new("pkg-config").args(["--libs", "espeak-ng"]).output() else {
        return false;
    };
    if !out.status.success() {
        return false;
    }
    let Ok(flags) = String::from_utf8(out.stdout) else {
        return false;
    };
    for token in flags.split_whitespace() {
        if let Some(path) = token.strip_prefix("-L") {
            println!("cargo:rustc-link-search=native={path}");
        } else if let Some(lib) = token.strip_prefix("-l") {
            println!("cargo:rustc-link-lib=dylib={lib}");
        }
    }
    true
}

fn candidate_dirs(target_os: &str, target_arch: &str) -> Vec<String> {
    let mut dirs: Vec<String> = Vec::new();
    if target_os == "macos" {
        for prefix in ["/opt/homebrew", "/usr/local"] {
            dirs.push(format!("{prefix}/opt/espeak-ng/lib"));
            dirs.push(format!("{prefix}/lib"));
        }
    } else {
        let multiarch = match target_arch {
            "x86_64" => "x86_64-linux-gnu",
            "aarch64" => "aarch64-linux-gnu",
            "arm" => "arm-linux-gnueabihf",
            _ => "",
        };
        if !multiarch.is_empty() {
            dirs.push(format!("/usr/lib/{multiarch}"));
        }
        dirs.extend(["/usr/lib64", "/usr/lib", "/usr/local/lib"].map(String::from));
    }
    dirs.into_iter().filter(|d| Path::new(d).is_dir()).collect()
}
