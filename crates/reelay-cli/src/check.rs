//! `reelay check`: a plain-text view of configuration and profile state.

use std::fmt::Write;

use reelay_core::{AppConfig, Profile, ProfileStore};

pub(crate) fn render_status(config: &AppConfig, store: &impl ProfileStore) -> String {
    let profiles = store.profiles();
    let mut out = String::new();
    let _ = writeln!(out, "environment:   {}", config.env);
    let _ = writeln!(out, "profiles file: {}", config.profiles_path.display());
    let _ = writeln!(out, "poll interval: {}s", config.poll_interval_secs);
    let _ = writeln!(out, "profiles:      {}", profiles.len());
    if profiles.is_empty() {
        return out;
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<20} {:<20} {:<8} {:<20} LAST UPLOAD",
        "TAG", "USERNAME", "RESOLVED", "THREAD"
    );
    for profile in &profiles {
        let _ = writeln!(out, "{}", status_row(profile));
    }
    out
}

fn status_row(profile: &Profile) -> String {
    let resolved = if profile.user_id.is_some() { "yes" } else { "no" };
    let thread = profile.thread.as_deref().unwrap_or("-");
    let last_upload = profile
        .last_upload
        .map_or_else(|| "never".to_owned(), |t| t.to_rfc3339());
    format!(
        "{:<20} {:<20} {:<8} {:<20} {last_upload}",
        profile.tag, profile.username, resolved, thread
    )
}
