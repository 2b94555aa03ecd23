pub(crate) mod time;

/// `"[name] "` for a named map, empty otherwise.
#[cfg(feature = "logging")]
pub(crate) fn log_prefix(map_name: Option<&str>) -> String {
    map_name.map(|name| format!("[{name}] ")).unwrap_or_default()
}
