// README → crate docs helper shared by every crate's build.rs.
//
// Usage: `include!("../build_common.rs");` with `std::env`, `std::fs` and
// `std::path::Path` imported in the including build script.

/// Render `README.md` into `$OUT_DIR/README_GENERATED.md` for `#![doc]`.
///
/// Links written for browsing the repo are rewritten so rustdoc can follow
/// them: `src/foo.rs` becomes the `foo` module, and links back to the
/// workspace README point at the repository URL instead.
fn process_readme_for_rustdoc(crate_dir: &str) {
    println!("cargo:rerun-if-changed=README.md");
    println!("cargo:rerun-if-changed=../../Cargo.toml");

    let crate_path = Path::new(crate_dir);
    let readme = fs::read_to_string(crate_path.join("README.md")).unwrap_or_default();

    let mut doc = readme.replace("](src/", "](").replace(".rs)", ")");
    if let Some(url) = repository_url(crate_path) {
        doc = doc.replace("](../../README.md", &format!("]({url}"));
    }

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    fs::write(Path::new(&out_dir).join("README_GENERATED.md"), doc)
        .expect("failed to write README_GENERATED.md");
}

/// `repository` from `[workspace.package]` in the root manifest.
fn repository_url(crate_path: &Path) -> Option<String> {
    let manifest = crate_path.parent()?.parent()?.join("Cargo.toml");
    let content = fs::read_to_string(manifest).ok()?;

    content.lines().map(str::trim).find_map(|line| {
        let value = line.strip_prefix("repository")?.trim_start().strip_prefix('=')?;
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}
