pub mod profiles;

pub use profiles::{
    profile_id, AuthProfile, AuthProfileKind, AuthProfilesData, AuthProfilesStore,
    CredentialStore, MemoryCredentialStore,
};

use chrono::Utc;

/// One line per stored profile for `openclaw auth status`. Secrets are never
/// rendered.
pub fn status_lines(data: &AuthProfilesData) -> Vec<String> {
    if data.profiles.is_empty() {
        return vec!["No auth profiles configured.".to_string()];
    }

    let mut lines = Vec::with_capacity(data.profiles.len());
    for (id, profile) in &data.profiles {
        let active = data
            .active_profiles
            .get(&profile.provider)
            .is_some_and(|active_id| active_id == id);
        let marker = if active { "*" } else { " " };
        lines.push(format!(
            "{marker} {id} provider={} kind={} expires={}",
            profile.provider,
            profile.kind.as_str(),
            format_expiry(profile)
        ));
    }
    lines
}

fn format_expiry(profile: &AuthProfile) -> String {
    match profile.expires_at {
        Some(ts) => {
            let now = Utc::now();
            if ts <= now {
                format!("expired at {}", ts.to_rfc3339())
            } else {
                let mins = (ts - now).num_minutes();
                format!("expires in {mins}m ({})", ts.to_rfc3339())
            }
        }
        None => "n/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_marks_active_profile_and_hides_secret() {
        let mut data = AuthProfilesData::default();
        let profile = AuthProfile::new_api_key("xai:default", "xai", "xai-secret".into());
        data.active_profiles
            .insert("xai".into(), "xai:default".into());
        data.profiles.insert(profile.id.clone(), profile);

        let lines = status_lines(&data);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("* xai:default"));
        assert!(lines[0].contains("kind=api_key"));
        assert!(!lines[0].contains("xai-secret"));
    }

    #[test]
    fn status_reports_expired_tokens() {
        let mut data = AuthProfilesData::default();
        let profile = AuthProfile::new_token(
            "anthropic:default",
            "anthropic",
            "tok".into(),
            Some(Utc::now() - chrono::Duration::minutes(5)),
        );
        data.profiles.insert(profile.id.clone(), profile);

        let lines = status_lines(&data);
        assert!(lines[0].starts_with("  anthropic:default"));
        assert!(lines[0].contains("expired at"));
    }

    #[test]
    fn status_for_empty_store() {
        let lines = status_lines(&AuthProfilesData::default());
        assert_eq!(lines, vec!["No auth profiles configured.".to_string()]);
    }
}
