// Build metadata generated by build.rs
include!(concat!(env!("OUT_DIR"), "/built.rs"));

/// One-line description of this binary for start-up logs
pub fn describe() -> String {
    format!("{} {} ({})", PKG_NAME, PKG_VERSION, TARGET)
}
