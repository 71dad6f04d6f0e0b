fn main() {
    println!("cargo:rerun-if-env-changed=LIBTORCH");

    // libtorch is only needed by the TorchScript detector backend
    if std::env::var_os("CARGO_FEATURE_TORCH").is_none() {
        return;
    }

    let libtorch_path = std::env::var("LIBTORCH").unwrap_or_else(|_| {
        let path = std::path::PathBuf::from("libtorch");
        path.to_string_lossy().into_owned()
    });

    println!("cargo:rustc-link-search=native={}/lib", libtorch_path);
    println!("cargo:rustc-link-lib=dylib=torch");
    println!("cargo:rustc-link-lib=dylib=c10");
}
