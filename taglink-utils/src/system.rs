use os_info::Info;

/// Human-readable OS/version string for the `/info` route, e.g. `"Linux 6.5.0 (Ubuntu 22.04)"`.
pub fn os_summary() -> String {
    let info: Info = os_info::get();
    match info.edition() {
        Some(edition) => format!("{} {} ({edition})", info.os_type(), info.version()),
        None => format!("{} {}", info.os_type(), info.version()),
    }
}
