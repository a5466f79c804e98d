use crate::documents::SettingsDocument;

const ENV_PREFIX: &str = "TAGLINK_";

/// Applies environment-variable overrides on top of the loaded settings document, so a
/// deployment can override a field without editing the JSON file (§4.9 ambient config layer).
/// Unset or unparseable variables leave the existing value untouched.
pub fn apply_env_overrides(settings: &mut SettingsDocument) {
    if let Some(value) = env_u64("CACHE_CAP_BYTES") {
        settings.cache_cap_bytes = value;
    }
    if let Some(value) = env_u32("UPLOAD_RATE_KBPS_ACTIVE") {
        settings.upload_rate_kbps_active = value;
    }
    if let Some(value) = env_u32("UPLOAD_RATE_KBPS_IDLE") {
        settings.upload_rate_kbps_idle = value;
    }
    if let Ok(value) = std::env::var(format!("{ENV_PREFIX}CONTENT_BASE_URL")) {
        settings.content_base_url = value;
    }
    if let Ok(value) = std::env::var(format!("{ENV_PREFIX}HTTP_BIND")) {
        settings.http_bind = value;
    }
    if let Some(value) = env_u64("LIVENESS_PERIOD_SECONDS") {
        settings.liveness_period_seconds = value;
    }
}

fn env_u64(suffix: &str) -> Option<u64> {
    std::env::var(format!("{ENV_PREFIX}{suffix}")).ok()?.parse().ok()
}

fn env_u32(suffix: &str) -> Option<u32> {
    std::env::var(format!("{ENV_PREFIX}{suffix}")).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_vars_leave_defaults_untouched() {
        std::env::remove_var("TAGLINK_CACHE_CAP_BYTES");
        let mut settings = SettingsDocument::default();
        let before = settings.cache_cap_bytes;
        apply_env_overrides(&mut settings);
        assert_eq!(settings.cache_cap_bytes, before);
    }

    #[test]
    fn set_var_overrides_value() {
        std::env::set_var("TAGLINK_CACHE_CAP_BYTES", "123456");
        let mut settings = SettingsDocument::default();
        apply_env_overrides(&mut settings);
        assert_eq!(settings.cache_cap_bytes, 123456);
        std::env::remove_var("TAGLINK_CACHE_CAP_BYTES");
    }
}
