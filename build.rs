fn main() {
    // Generates $OUT_DIR/built.rs, included by `crate::build_info`
    built::write_built_file().expect("Failed to generate build info");
}
